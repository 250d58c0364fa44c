//! Air-quality monitoring service backing a map dashboard.
//!
//! Readings come from the WAQI public API (`ingest::waqi`), are resolved
//! into an AQI and severity band (`aqi`, `alert`), and are reshaped into
//! map markers and station details for the UI (`proxy`). The `refresh`
//! module drives the polling cycle.

pub mod alert;
pub mod aqi;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod proxy;
pub mod refresh;
