/// WAQI (World Air Quality Index project) API Client
///
/// Retrieves station readings from the public WAQI JSON API for display on
/// the map dashboard. Three endpoints are used:
///
/// - `/map/bounds`: every station inside a lat/lng rectangle, with its
///   current index but no pollutant breakdown
/// - `/feed/@{uid}`: full latest reading for one station
/// - `/search`: stations whose name matches a keyword
///
/// Every response is wrapped in `{"status": "ok" | "error", "data": ...}`.
/// On error, `data` is a message string such as `"Invalid key"` or
/// `"Unknown station"`.
///
/// API Documentation: https://aqicn.org/json-api/doc/

use crate::aqi;
use crate::config::WaqiConfig;
use crate::model::{Bounds, PollutantReadings, WaqiError, WeatherReadings};
use reqwest::Url;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = concat!("aqimon/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// WAQI API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Value,
}

/// One station from a `/map/bounds` query.
#[derive(Debug, Clone, Deserialize)]
pub struct MapStation {
    pub uid: u64,
    pub lat: f64,
    pub lon: f64,
    /// `"-"` on the wire when the station has no current value.
    #[serde(default, deserialize_with = "loose_index")]
    pub aqi: Option<i64>,
    pub station: MapStationInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapStationInfo {
    pub name: String,
    /// RFC 3339 observation time in station-local offset.
    #[serde(default)]
    pub time: Option<String>,
}

/// Latest full reading for one station, from `/feed/@{uid}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StationFeed {
    #[serde(default, deserialize_with = "loose_index")]
    pub aqi: Option<i64>,
    pub idx: u64,
    pub city: FeedCity,
    /// Dominant pollutant key (sic, WAQI's spelling), e.g. `"pm25"`.
    #[serde(default, rename = "dominentpol")]
    pub dominant_pollutant: Option<String>,
    /// Individual readings keyed by pollutant or weather code.
    #[serde(default)]
    pub iaqi: HashMap<String, IaqiValue>,
    #[serde(default)]
    pub time: Option<FeedTime>,
    #[serde(default)]
    pub attributions: Vec<Attribution>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedCity {
    pub name: String,
    #[serde(default)]
    pub geo: Vec<Value>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IaqiValue {
    #[serde(default)]
    pub v: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedTime {
    /// Local time, `"YYYY-MM-DD HH:MM:SS"`.
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
    /// RFC 3339 form of the same instant.
    #[serde(default)]
    pub iso: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attribution {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// One station from a `/search` query.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub uid: u64,
    #[serde(default, deserialize_with = "loose_index")]
    pub aqi: Option<i64>,
    #[serde(default)]
    pub time: Option<SearchTime>,
    pub station: SearchStation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchTime {
    #[serde(default)]
    pub stime: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchStation {
    pub name: String,
    #[serde(default)]
    pub geo: Vec<Value>,
    #[serde(default)]
    pub url: Option<String>,
}

fn loose_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(aqi::parse_upstream_index(&value))
}

/// Reads a `[lat, lng]` pair whose elements may be numbers or strings.
fn geo_pair(geo: &[Value]) -> Option<(f64, f64)> {
    let coord = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match geo {
        [lat, lng, ..] => Some((coord(lat)?, coord(lng)?)),
        _ => None,
    }
}

impl StationFeed {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        geo_pair(&self.city.geo)
    }

    /// Concentration-style value for an `iaqi` key, if reported.
    pub fn reading(&self, key: &str) -> Option<f64> {
        self.iaqi.get(key).and_then(|r| aqi::parse_concentration(&r.v))
    }

    /// Raw numeric value for an `iaqi` key; unlike `reading`, negatives
    /// (e.g. sub-zero temperatures) are kept.
    fn signed_reading(&self, key: &str) -> Option<f64> {
        self.iaqi.get(key).and_then(|r| match &r.v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }

    pub fn pollutants(&self) -> PollutantReadings {
        PollutantReadings {
            pm25: self.reading("pm25"),
            pm10: self.reading("pm10"),
            o3: self.reading("o3"),
            no2: self.reading("no2"),
            so2: self.reading("so2"),
            co: self.reading("co"),
        }
    }

    pub fn weather(&self) -> WeatherReadings {
        WeatherReadings {
            temperature_c: self.signed_reading("t"),
            relative_humidity: self.reading("h"),
            pressure_hpa: self.reading("p"),
            wind_speed_ms: self.reading("w"),
        }
    }

    pub fn observed_at(&self) -> Option<&str> {
        self.time.as_ref().and_then(|t| t.iso.as_deref())
    }
}

impl SearchHit {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        geo_pair(&self.station.geo)
    }
}

// ============================================================================
// URL Construction
// ============================================================================

fn endpoint(config: &WaqiConfig, path: &str) -> Result<Url, WaqiError> {
    let raw = format!("{}/{}", config.base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&raw).map_err(|e| WaqiError::Request(format!("invalid URL '{}': {}", raw, e)))?;
    url.query_pairs_mut().append_pair("token", &config.token);
    Ok(url)
}

/// `/map/bounds?latlng=lat1,lng1,lat2,lng2&networks=all&token=...`
pub fn build_bounds_url(config: &WaqiConfig, bounds: &Bounds) -> Result<Url, WaqiError> {
    let mut url = endpoint(config, "map/bounds")?;
    url.query_pairs_mut()
        .append_pair(
            "latlng",
            &format!("{},{},{},{}", bounds.lat1, bounds.lng1, bounds.lat2, bounds.lng2),
        )
        .append_pair("networks", "all");
    Ok(url)
}

/// `/feed/@{uid}/?token=...`
pub fn build_feed_url(config: &WaqiConfig, uid: u64) -> Result<Url, WaqiError> {
    endpoint(config, &format!("feed/@{}/", uid))
}

/// `/search/?keyword=...&token=...`
pub fn build_search_url(config: &WaqiConfig, keyword: &str) -> Result<Url, WaqiError> {
    let mut url = endpoint(config, "search/")?;
    url.query_pairs_mut().append_pair("keyword", keyword.trim());
    Ok(url)
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Unwraps the status envelope and deserializes `data` as `T`.
fn parse_envelope<T>(body: &str) -> Result<T, WaqiError>
where
    T: for<'de> Deserialize<'de>,
{
    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.status != "ok" {
        let message = match envelope.data {
            Value::String(s) => s,
            Value::Null => format!("status '{}'", envelope.status),
            other => other.to_string(),
        };
        return Err(WaqiError::Api(message));
    }
    Ok(serde_json::from_value(envelope.data)?)
}

pub fn parse_bounds_response(body: &str) -> Result<Vec<MapStation>, WaqiError> {
    parse_envelope(body)
}

/// Parses a feed body. An "Unknown station" API error becomes
/// `StationNotFound(uid)`.
pub fn parse_feed_response(body: &str, uid: u64) -> Result<StationFeed, WaqiError> {
    parse_envelope(body).map_err(|e| match e {
        WaqiError::Api(msg) if msg.to_ascii_lowercase().contains("unknown station") => {
            WaqiError::StationNotFound(uid)
        }
        other => other,
    })
}

pub fn parse_search_response(body: &str) -> Result<Vec<SearchHit>, WaqiError> {
    parse_envelope(body)
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Build the blocking HTTP client shared by all calls.
pub fn build_client(config: &WaqiConfig) -> Result<reqwest::blocking::Client, WaqiError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}

fn get_body(client: &reqwest::blocking::Client, url: Url) -> Result<String, WaqiError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(WaqiError::Http(response.status().as_u16()));
    }

    Ok(response.text()?)
}

/// Fetch all stations inside `bounds`.
pub fn fetch_bounds(
    client: &reqwest::blocking::Client,
    config: &WaqiConfig,
    bounds: &Bounds,
) -> Result<Vec<MapStation>, WaqiError> {
    let body = get_body(client, build_bounds_url(config, bounds)?)?;
    parse_bounds_response(&body)
}

/// Fetch the latest full reading for station `uid`.
pub fn fetch_feed(
    client: &reqwest::blocking::Client,
    config: &WaqiConfig,
    uid: u64,
) -> Result<StationFeed, WaqiError> {
    let body = get_body(client, build_feed_url(config, uid)?)?;
    parse_feed_response(&body, uid)
}

/// Search stations by name keyword.
pub fn fetch_search(
    client: &reqwest::blocking::Client,
    config: &WaqiConfig,
    keyword: &str,
) -> Result<Vec<SearchHit>, WaqiError> {
    let body = get_body(client, build_search_url(config, keyword)?)?;
    parse_search_response(&body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WaqiConfig {
        WaqiConfig {
            base_url: "https://api.waqi.info/".to_string(),
            token: "demo".to_string(),
            timeout_secs: 10,
        }
    }

    const BOUNDS_BODY: &str = r#"{
        "status": "ok",
        "data": [
            {"lat": 39.954592, "lon": 116.468117, "uid": 1451, "aqi": "57",
             "station": {"name": "Beijing (北京)", "time": "2024-05-01T20:00:00+08:00"}},
            {"lat": 39.8673, "lon": 116.366, "uid": 450, "aqi": "-",
             "station": {"name": "Beijing Fengtai Yungang", "time": "2024-04-28T09:00:00+08:00"}},
            {"lat": 40.0, "lon": 116.2, "uid": 3303, "aqi": 112,
             "station": {"name": "Haidian Wanliu"}}
        ]
    }"#;

    const FEED_BODY: &str = r#"{
        "status": "ok",
        "data": {
            "aqi": 57,
            "idx": 1451,
            "attributions": [
                {"url": "http://www.bjmemc.com.cn/", "name": "Beijing Environmental Protection Monitoring Center"},
                {"url": "https://waqi.info/", "name": "World Air Quality Index Project"}
            ],
            "city": {"geo": [39.954592, 116.468117], "name": "Beijing (北京)", "url": "https://aqicn.org/city/beijing"},
            "dominentpol": "pm25",
            "iaqi": {
                "pm25": {"v": 57},
                "pm10": {"v": 23},
                "o3": {"v": 31.4},
                "no2": {"v": 9.2},
                "t": {"v": -3.5},
                "h": {"v": 41},
                "p": {"v": 1012},
                "w": {"v": 2.1}
            },
            "time": {"s": "2024-05-01 20:00:00", "tz": "+08:00", "v": 1714593600, "iso": "2024-05-01T20:00:00+08:00"}
        }
    }"#;

    #[test]
    fn test_bounds_url_contains_rectangle_and_token() {
        let bounds = Bounds { lat1: 39.4, lng1: 115.9, lat2: 40.4, lng2: 117.0 };
        let url = build_bounds_url(&config(), &bounds).expect("valid URL");
        assert_eq!(url.path(), "/map/bounds");
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query.get("latlng").map(String::as_str), Some("39.4,115.9,40.4,117"));
        assert_eq!(query.get("networks").map(String::as_str), Some("all"));
        assert_eq!(query.get("token").map(String::as_str), Some("demo"));
    }

    #[test]
    fn test_feed_url_uses_uid_path() {
        let url = build_feed_url(&config(), 1451).expect("valid URL");
        assert_eq!(url.path(), "/feed/@1451/");
    }

    #[test]
    fn test_search_keyword_is_percent_encoded() {
        let url = build_search_url(&config(), " san francisco & bay ").expect("valid URL");
        assert_eq!(url.path(), "/search/");
        assert!(url.as_str().contains("keyword=san+francisco+%26+bay"), "got {}", url);
    }

    #[test]
    fn test_invalid_base_url_is_request_error() {
        let mut c = config();
        c.base_url = "not a url".into();
        assert!(matches!(build_feed_url(&c, 1), Err(WaqiError::Request(_))));
    }

    #[test]
    fn test_parse_bounds_normalises_loose_aqi_values() {
        let stations = parse_bounds_response(BOUNDS_BODY).expect("valid body");
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].aqi, Some(57));
        assert_eq!(stations[1].aqi, None, "'-' means no current value");
        assert_eq!(stations[2].aqi, Some(112));
        assert_eq!(stations[2].station.time, None);
    }

    #[test]
    fn test_parse_feed_extracts_readings() {
        let feed = parse_feed_response(FEED_BODY, 1451).expect("valid body");
        assert_eq!(feed.idx, 1451);
        assert_eq!(feed.aqi, Some(57));
        assert_eq!(feed.dominant_pollutant.as_deref(), Some("pm25"));
        assert_eq!(feed.coordinates(), Some((39.954592, 116.468117)));
        assert_eq!(feed.observed_at(), Some("2024-05-01T20:00:00+08:00"));

        let p = feed.pollutants();
        assert_eq!(p.pm25, Some(57.0));
        assert_eq!(p.o3, Some(31.4));
        assert_eq!(p.so2, None, "unreported pollutant stays absent");

        let w = feed.weather();
        assert_eq!(w.temperature_c, Some(-3.5), "negative temperature is kept");
        assert_eq!(w.relative_humidity, Some(41.0));
        assert_eq!(feed.attributions.len(), 2);
    }

    #[test]
    fn test_parse_feed_with_minimal_fields() {
        let body = r#"{"status":"ok","data":{"aqi":"-","idx":9,"city":{"name":"Nowhere"}}}"#;
        let feed = parse_feed_response(body, 9).expect("minimal feed is valid");
        assert_eq!(feed.aqi, None);
        assert_eq!(feed.coordinates(), None);
        assert_eq!(feed.pollutants(), PollutantReadings::default());
        assert_eq!(feed.observed_at(), None);
    }

    #[test]
    fn test_api_error_status_is_surfaced() {
        let err = parse_bounds_response(r#"{"status":"error","data":"Invalid key"}"#).unwrap_err();
        assert_eq!(err, WaqiError::Api("Invalid key".into()));
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_unknown_station_maps_to_not_found() {
        let err = parse_feed_response(r#"{"status":"error","data":"Unknown station"}"#, 42).unwrap_err();
        assert_eq!(err, WaqiError::StationNotFound(42));
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        assert!(matches!(parse_bounds_response("<html>"), Err(WaqiError::Parse(_))));
        assert!(matches!(
            parse_bounds_response(r#"{"status":"ok","data":{"not":"a list"}}"#),
            Err(WaqiError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_search_handles_string_geo() {
        let body = r#"{"status":"ok","data":[
            {"uid": 1451, "aqi": "57", "time": {"tz": "+08:00", "stime": "2024-05-01 20:00:00"},
             "station": {"name": "Beijing (北京)", "geo": ["39.954592", "116.468117"], "url": "beijing"}},
            {"uid": 77, "aqi": "-", "station": {"name": "Orphan", "geo": []}}
        ]}"#;
        let hits = parse_search_response(body).expect("valid body");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].coordinates(), Some((39.954592, 116.468117)));
        assert_eq!(hits[1].coordinates(), None);
        assert_eq!(hits[1].aqi, None);
    }
}
