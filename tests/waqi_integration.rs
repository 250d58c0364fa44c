/// Integration tests against the live WAQI API
///
/// These tests verify:
/// 1. The bounds endpoint returns stations for a busy region
/// 2. Feeds for returned stations parse into our model
/// 3. A bad token surfaces as an authentication failure
/// 4. The full snapshot cycle completes
///
/// Prerequisites:
/// - WAQI_TOKEN set in the environment or .env (the public "demo" token
///   only serves a few cities and will fail the bounds test)
/// - Internet connectivity to api.waqi.info
///
/// Run with: cargo test --test waqi_integration -- --ignored --test-threads=1

use aqimon_service::config::{Config, TOKEN_ENV_VAR};
use aqimon_service::ingest::waqi;
use aqimon_service::model::Bounds;
use aqimon_service::proxy;
use chrono::Utc;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn live_config() -> Config {
    dotenv::dotenv().ok();
    let mut config = Config::default();
    config.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());
    if config.validate().is_err() {
        panic!("{} must be set to run live WAQI tests", TOKEN_ENV_VAR);
    }
    config.refresh.max_enriched_stations = 3;
    config
}

fn client(config: &Config) -> reqwest::blocking::Client {
    waqi::build_client(&config.waqi).expect("Failed to create HTTP client")
}

// ---------------------------------------------------------------------------
// Live API Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore] // Don't run in CI - depends on external API
fn test_bounds_returns_stations_for_beijing() {
    let config = live_config();
    let bounds = Bounds { lat1: 39.4, lng1: 115.9, lat2: 40.4, lng2: 117.0 };

    let stations = waqi::fetch_bounds(&client(&config), &config.waqi, &bounds)
        .expect("bounds query should succeed");

    println!("✓ WAQI returned {} stations in Beijing bounds", stations.len());
    assert!(!stations.is_empty(), "Beijing always has reporting stations");
    for s in &stations {
        assert!(s.lat >= 39.0 && s.lat <= 41.0, "station {} outside query box", s.uid);
    }
}

#[test]
#[ignore] // Don't run in CI - depends on external API
fn test_feed_parses_for_known_station() {
    let config = live_config();
    // 1451 = Beijing US Embassy, one of the longest-running WAQI stations
    let feed = waqi::fetch_feed(&client(&config), &config.waqi, 1451)
        .expect("feed query should succeed");

    let detail = proxy::detail_from_feed(&feed, Utc::now(), config.refresh.stale_after_minutes);
    println!("✓ station {} '{}' → {:?} ({})", detail.uid, detail.name, detail.aqi, detail.category);
    assert_eq!(detail.uid, 1451);
    assert!(detail.lat.is_some() && detail.lon.is_some());
}

#[test]
#[ignore] // Don't run in CI - depends on external API
fn test_bad_token_is_auth_failure() {
    let mut config = live_config();
    config.waqi.token = "definitely-not-a-token".to_string();

    let err = waqi::fetch_feed(&client(&config), &config.waqi, 1451)
        .expect_err("bad token must be rejected");
    assert!(err.is_auth_failure(), "expected Invalid key, got {:?}", err);
}

#[test]
#[ignore] // Don't run in CI - depends on external API
fn test_full_snapshot_cycle() {
    let config = live_config();
    let (snapshot, stats) = proxy::build_snapshot(&client(&config), &config, Utc::now())
        .expect("snapshot cycle should succeed");

    println!(
        "✓ snapshot: {} markers, {}/{} enriched",
        snapshot.markers.len(),
        stats.succeeded,
        stats.attempted
    );
    assert_eq!(snapshot.summary.total(), snapshot.markers.len());
    assert!(stats.attempted <= 3);
}
