//! aqimon - air-quality map dashboard backend
//!
//! Usage:
//!   aqimon                          # poll the configured map region forever
//!   aqimon --once                   # one refresh cycle, then exit
//!   aqimon -c /etc/aqimon.toml      # alternate config file
//!   aqimon --once --filter beijing  # only markers whose name matches
//!   aqimon --search "san francisco" # forward a station search and exit
//!
//! Each cycle prints one JSON snapshot line to stdout; logs go to stderr or
//! the configured log file.

use aqimon_service::config::{Config, DEFAULT_CONFIG_PATH};
use aqimon_service::ingest::waqi;
use aqimon_service::logging::{self, DataSource};
use aqimon_service::model::WaqiError;
use aqimon_service::proxy;
use aqimon_service::refresh::spawn_refresh;
use argh::FromArgs;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

/// Poll WAQI for the configured map region and print dashboard snapshots.
#[derive(FromArgs)]
struct Args {
    /// path to the TOML config file (default: aqimon.toml)
    #[argh(option, short = 'c', default = "String::from(DEFAULT_CONFIG_PATH)")]
    config: String,

    /// run a single refresh cycle and exit
    #[argh(switch)]
    once: bool,

    /// keep only markers whose station name contains this text
    #[argh(option)]
    filter: Option<String>,

    /// search stations by keyword, print the matches and exit
    #[argh(option)]
    search: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    let config = Config::load(Path::new(&args.config))?;
    logging::init_logger(config.log_level(), config.logging.file.as_deref())?;
    config.validate()?;

    let client = waqi::build_client(&config.waqi)?;

    if let Some(keyword) = args.search.as_deref() {
        let markers = proxy::search(&client, &config, keyword, Utc::now())?;
        logging::info(
            DataSource::Proxy,
            None,
            &format!("search '{}' matched {} stations", keyword.trim(), markers.len()),
        );
        println!("{}", serde_json::to_string(&markers)?);
        return Ok(());
    }

    logging::info(
        DataSource::System,
        None,
        &format!(
            "monitoring {:?} every {}s",
            config.map, config.refresh.interval_secs
        ),
    );

    let interval = Duration::from_secs(config.refresh.interval_secs);
    let filter = args.filter;

    if args.once {
        run_cycle(&client, &config, filter.as_deref())?;
        return Ok(());
    }

    // Failures are logged inside the cycle; the loop keeps polling.
    let cycle = move || {
        let _ = run_cycle(&client, &config, filter.as_deref());
    };
    spawn_refresh(interval, cycle).wait();
    Ok(())
}

/// One refresh cycle. A failed bounds query is logged and returned so that
/// `--once` exits non-zero.
fn run_cycle(
    client: &reqwest::blocking::Client,
    config: &Config,
    filter: Option<&str>,
) -> Result<(), WaqiError> {
    let now = Utc::now();
    match proxy::build_snapshot(client, config, now) {
        Ok((snapshot, stats)) => {
            let snapshot = match filter {
                Some(query) => snapshot.filtered(query),
                None => snapshot,
            };

            match serde_json::to_string(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => logging::error(
                    DataSource::Proxy,
                    None,
                    &format!("failed to serialize snapshot: {}", e),
                ),
            }
            logging::log_refresh_summary(stats.attempted, stats.succeeded, stats.failed);
            Ok(())
        }
        Err(e) => {
            logging::log_waqi_failure(None, "map bounds query", &e);
            if e.is_auth_failure() {
                logging::error(
                    DataSource::System,
                    None,
                    "WAQI rejected the token; check waqi.token or WAQI_TOKEN",
                );
            }
            Err(e)
        }
    }
}
