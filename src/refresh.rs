//! Scheduled polling with an explicit cancellation handle.
//!
//! `spawn_refresh` runs a task immediately and then once per interval on a
//! background thread. The returned `RefreshHandle` owns the thread: calling
//! `cancel` (or dropping the handle) wakes the sleeping loop and joins it, so
//! no cycle starts after cancellation returns.

use crate::logging::{self, DataSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct RefreshHandle {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    cycles: Arc<AtomicU64>,
}

/// Start running `task` every `interval`, beginning now.
pub fn spawn_refresh<F>(interval: Duration, mut task: F) -> RefreshHandle
where
    F: FnMut() + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let cycles = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&cycles);

    let worker = std::thread::spawn(move || {
        loop {
            task();
            counter.fetch_add(1, Ordering::SeqCst);

            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                // Explicit cancel or handle dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        logging::debug(DataSource::System, None, "refresh loop stopped");
    });

    RefreshHandle {
        stop: Some(stop_tx),
        worker: Some(worker),
        cycles,
    }
}

impl RefreshHandle {
    /// Number of completed task runs.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Stop the loop and wait for an in-flight cycle to finish.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    /// Block until the loop exits on its own, i.e. forever unless the task
    /// panics. Used by the daemon binary.
    pub fn wait(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                logging::error(DataSource::System, None, "refresh loop panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Send fails only if the loop already exited.
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                logging::error(DataSource::System, None, "refresh loop panicked");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
