//! Reshaping WAQI responses for the map UI.
//!
//! The UI needs one compact record per map marker (position, index, band
//! colour) plus a richer detail record for stations it opens. Bounds queries
//! only carry an index; stations without one are enriched from their feed,
//! where the index can be derived from the PM2.5 reading instead.

use crate::alert::categories::{Classification, SeverityCategory, classify};
use crate::alert::stalenesses::is_stale_at;
use crate::aqi::{Aqi, resolve_aqi};
use crate::config::Config;
use crate::ingest::waqi::{self, MapStation, SearchHit, StationFeed};
use crate::logging;
use crate::model::{Bounds, PollutantReadings, WaqiError, WeatherReadings};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// UI Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMarker {
    pub uid: u64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub aqi: Option<Aqi>,
    pub category: &'static str,
    pub color: &'static str,
    pub observed_at: Option<String>,
    pub stale: bool,
}

impl StationMarker {
    pub fn classification(&self) -> Classification {
        classify(self.aqi)
    }

    fn set_aqi(&mut self, aqi: Option<Aqi>) {
        let c = classify(aqi);
        self.aqi = aqi;
        self.category = c.label();
        self.color = c.color();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationDetail {
    pub uid: u64,
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub aqi: Option<Aqi>,
    /// True when the index was computed from PM2.5 rather than reported.
    pub derived: bool,
    pub category: &'static str,
    pub color: &'static str,
    pub dominant_pollutant: Option<String>,
    pub pollutants: PollutantReadings,
    pub weather: WeatherReadings,
    pub observed_at: Option<String>,
    pub stale: bool,
    pub attributions: Vec<String>,
    pub url: Option<String>,
}

/// Per-category marker counts for the sidebar legend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub good: usize,
    pub moderate: usize,
    pub unhealthy_for_sensitive_groups: usize,
    pub unhealthy: usize,
    pub very_unhealthy: usize,
    pub hazardous: usize,
    pub no_data: usize,
    pub stale: usize,
}

impl CategorySummary {
    pub fn tally(markers: &[StationMarker]) -> Self {
        let mut s = CategorySummary::default();
        for m in markers {
            let slot = match m.classification() {
                Classification::Rated(SeverityCategory::Good) => &mut s.good,
                Classification::Rated(SeverityCategory::Moderate) => &mut s.moderate,
                Classification::Rated(SeverityCategory::UnhealthyForSensitiveGroups) => {
                    &mut s.unhealthy_for_sensitive_groups
                }
                Classification::Rated(SeverityCategory::Unhealthy) => &mut s.unhealthy,
                Classification::Rated(SeverityCategory::VeryUnhealthy) => &mut s.very_unhealthy,
                Classification::Rated(SeverityCategory::Hazardous) => &mut s.hazardous,
                Classification::NoData => &mut s.no_data,
            };
            *slot += 1;
            if m.stale {
                s.stale += 1;
            }
        }
        s
    }

    pub fn total(&self) -> usize {
        self.good
            + self.moderate
            + self.unhealthy_for_sensitive_groups
            + self.unhealthy
            + self.very_unhealthy
            + self.hazardous
            + self.no_data
    }
}

/// Payload produced by one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub bounds: Bounds,
    pub markers: Vec<StationMarker>,
    pub details: Vec<StationDetail>,
    pub summary: CategorySummary,
}

/// Enrichment counts for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

// ============================================================================
// Conversion
// ============================================================================

/// Missing or unparseable observation times count as stale.
fn stale_flag(observed_at: Option<&str>, stale_after_minutes: u64, now: DateTime<Utc>) -> bool {
    observed_at
        .map(|t| is_stale_at(t, stale_after_minutes, now).unwrap_or(true))
        .unwrap_or(true)
}

fn marker(
    uid: u64,
    name: String,
    (lat, lon): (f64, f64),
    aqi: Option<Aqi>,
    observed_at: Option<String>,
    stale_after_minutes: u64,
    now: DateTime<Utc>,
) -> StationMarker {
    let c = classify(aqi);
    let stale = stale_flag(observed_at.as_deref(), stale_after_minutes, now);
    StationMarker {
        uid,
        name,
        lat,
        lon,
        aqi,
        category: c.label(),
        color: c.color(),
        observed_at,
        stale,
    }
}

/// Convert bounds hits into markers. Bounds carry no PM2.5, so only the
/// upstream index is used.
pub fn markers_from_bounds(
    stations: &[MapStation],
    now: DateTime<Utc>,
    stale_after_minutes: u64,
) -> Vec<StationMarker> {
    stations
        .iter()
        .map(|s| {
            marker(
                s.uid,
                s.station.name.clone(),
                (s.lat, s.lon),
                resolve_aqi(s.aqi, None),
                s.station.time.clone(),
                stale_after_minutes,
                now,
            )
        })
        .collect()
}

/// Search results give local time and offset separately; join them into
/// RFC 3339.
fn search_observed_at(hit: &SearchHit) -> Option<String> {
    let time = hit.time.as_ref()?;
    let stime = time.stime.as_deref()?.trim();
    let tz = time.tz.as_deref()?.trim();
    Some(format!("{}{}", stime.replacen(' ', "T", 1), tz))
}

/// Convert search hits into markers, dropping hits without coordinates.
pub fn markers_from_search(
    hits: &[SearchHit],
    now: DateTime<Utc>,
    stale_after_minutes: u64,
) -> Vec<StationMarker> {
    hits.iter()
        .filter_map(|h| {
            let coords = h.coordinates()?;
            Some(marker(
                h.uid,
                h.station.name.clone(),
                coords,
                resolve_aqi(h.aqi, None),
                search_observed_at(h),
                stale_after_minutes,
                now,
            ))
        })
        .collect()
}

/// Build the detail record for one station feed.
pub fn detail_from_feed(
    feed: &StationFeed,
    now: DateTime<Utc>,
    stale_after_minutes: u64,
) -> StationDetail {
    let pollutants = feed.pollutants();
    let reported = feed.aqi.and_then(Aqi::from_upstream);
    let aqi = resolve_aqi(feed.aqi, pollutants.pm25);
    let c = classify(aqi);
    let observed_at = feed.observed_at().map(str::to_string);
    let (lat, lon) = feed.coordinates().unzip();

    StationDetail {
        uid: feed.idx,
        name: feed.city.name.clone(),
        lat,
        lon,
        aqi,
        derived: reported.is_none() && aqi.is_some(),
        category: c.label(),
        color: c.color(),
        dominant_pollutant: feed.dominant_pollutant.clone(),
        pollutants,
        weather: feed.weather(),
        stale: stale_flag(observed_at.as_deref(), stale_after_minutes, now),
        observed_at,
        attributions: feed.attributions.iter().map(|a| a.name.clone()).collect(),
        url: feed.city.url.clone(),
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// Fetch feeds for the first `limit` markers in parallel using `fetch`, fill
/// in missing indexes and observation times, and return the details.
///
/// A failed fetch is logged and leaves its marker unchanged.
pub fn enrich_with<F>(
    markers: &mut [StationMarker],
    limit: usize,
    now: DateTime<Utc>,
    stale_after_minutes: u64,
    fetch: F,
) -> (Vec<StationDetail>, EnrichStats)
where
    F: Fn(u64) -> Result<StationFeed, WaqiError> + Sync,
{
    let count = limit.min(markers.len());
    let targets = &mut markers[..count];

    let fetch = &fetch;
    let results: Vec<Result<StationFeed, WaqiError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|m| {
                let uid = m.uid;
                scope.spawn(move || fetch(uid))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(WaqiError::Request("feed worker panicked".into())))
            })
            .collect()
    });

    let mut stats = EnrichStats { attempted: count, ..Default::default() };
    let mut details = Vec::with_capacity(count);

    for (m, result) in targets.iter_mut().zip(results) {
        match result {
            Ok(feed) => {
                let detail = detail_from_feed(&feed, now, stale_after_minutes);
                if m.aqi.is_none() && detail.aqi.is_some() {
                    m.set_aqi(detail.aqi);
                }
                if m.observed_at.is_none() && detail.observed_at.is_some() {
                    m.observed_at = detail.observed_at.clone();
                    m.stale = detail.stale;
                }
                details.push(detail);
                stats.succeeded += 1;
            }
            Err(e) => {
                logging::log_waqi_failure(Some(&m.uid.to_string()), "fetch_feed", &e);
                stats.failed += 1;
            }
        }
    }

    (details, stats)
}

/// Enrich markers from live WAQI feeds.
pub fn enrich_markers(
    client: &reqwest::blocking::Client,
    config: &Config,
    markers: &mut [StationMarker],
    now: DateTime<Utc>,
) -> (Vec<StationDetail>, EnrichStats) {
    enrich_with(
        markers,
        config.refresh.max_enriched_stations,
        now,
        config.refresh.stale_after_minutes,
        |uid| waqi::fetch_feed(client, &config.waqi, uid),
    )
}

// ============================================================================
// Search & Filtering
// ============================================================================

/// Forward a keyword search to WAQI. A blank keyword returns nothing
/// without calling the API.
pub fn search(
    client: &reqwest::blocking::Client,
    config: &Config,
    keyword: &str,
    now: DateTime<Utc>,
) -> Result<Vec<StationMarker>, WaqiError> {
    if keyword.trim().is_empty() {
        return Ok(Vec::new());
    }
    let hits = waqi::fetch_search(client, &config.waqi, keyword)?;
    Ok(markers_from_search(&hits, now, config.refresh.stale_after_minutes))
}

/// Case-insensitive station-name filter for the sidebar. A blank query
/// keeps everything.
pub fn filter_markers<'a>(markers: &'a [StationMarker], query: &str) -> Vec<&'a StationMarker> {
    let needle = query.trim().to_lowercase();
    markers
        .iter()
        .filter(|m| needle.is_empty() || m.name.to_lowercase().contains(&needle))
        .collect()
}

// ============================================================================
// Snapshot
// ============================================================================

impl Snapshot {
    pub fn new(
        bounds: Bounds,
        markers: Vec<StationMarker>,
        details: Vec<StationDetail>,
        now: DateTime<Utc>,
    ) -> Self {
        let summary = CategorySummary::tally(&markers);
        Snapshot {
            generated_at: now,
            bounds,
            markers,
            details,
            summary,
        }
    }

    /// Narrow the snapshot to stations whose name matches `query`, keeping
    /// only the details for markers that survive. The summary is re-tallied.
    pub fn filtered(self, query: &str) -> Self {
        let markers: Vec<StationMarker> =
            filter_markers(&self.markers, query).into_iter().cloned().collect();
        let details = self
            .details
            .into_iter()
            .filter(|d| markers.iter().any(|m| m.uid == d.uid))
            .collect();
        Snapshot::new(self.bounds, markers, details, self.generated_at)
    }
}

/// One full cycle: bounds query, marker conversion, feed enrichment.
pub fn build_snapshot(
    client: &reqwest::blocking::Client,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<(Snapshot, EnrichStats), WaqiError> {
    let stations = waqi::fetch_bounds(client, &config.waqi, &config.map)?;
    logging::debug(
        logging::DataSource::Waqi,
        None,
        &format!("bounds query returned {} stations", stations.len()),
    );

    let mut markers = markers_from_bounds(&stations, now, config.refresh.stale_after_minutes);
    let (details, stats) = enrich_markers(client, config, &mut markers, now);
    Ok((Snapshot::new(config.map, markers, details, now), stats))
}

// ============================================================================
// Tests
// ============================================================================
