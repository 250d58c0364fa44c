/// Core data types for the air-quality monitoring service.
///
/// This module defines the shared domain model imported by the ingest,
/// proxy and refresh layers. Stations are owned by the upstream provider;
/// these types only describe what we read back from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A rectangular map viewport, as two opposite corners in WGS84 degrees.
///
/// `(lat1, lng1)` is the south-west corner and `(lat2, lng2)` the north-east
/// corner; `validate` enforces that ordering. Missing keys take the
/// default viewport's value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub lat1: f64,
    pub lng1: f64,
    pub lat2: f64,
    pub lng2: f64,
}

/// Default viewport: greater Beijing.
impl Default for Bounds {
    fn default() -> Self {
        Bounds { lat1: 39.4, lng1: 115.9, lat2: 40.4, lng2: 117.0 }
    }
}

impl Bounds {
    /// Checks coordinate ranges and corner ordering.
    pub fn validate(&self) -> Result<(), String> {
        for lat in [self.lat1, self.lat2] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(format!("latitude {} out of range", lat));
            }
        }
        for lng in [self.lng1, self.lng2] {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(format!("longitude {} out of range", lng));
            }
        }
        if self.lat1 >= self.lat2 || self.lng1 >= self.lng2 {
            return Err("bounds corners must be south-west then north-east".to_string());
        }
        Ok(())
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.lat1..=self.lat2).contains(&lat) && (self.lng1..=self.lng2).contains(&lng)
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Individual pollutant and weather values from a station feed.
///
/// Every field is optional: stations report whichever sensors they carry,
/// and a missing field means "not reported", not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollutantReadings {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherReadings {
    pub temperature_c: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or processing WAQI data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaqiError {
    /// Non-2xx HTTP response from the WAQI API.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// The request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Request(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The API answered with `"status": "error"`.
    #[error("API error: {0}")]
    Api(String),
    /// A feed was requested for a station the API does not know.
    #[error("Station not found: {0}")]
    StationNotFound(u64),
}

impl WaqiError {
    /// WAQI reports a bad or missing token as an API error with this text.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, WaqiError::Api(msg) if msg.to_ascii_lowercase().contains("invalid key"))
    }
}

impl From<reqwest::Error> for WaqiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => WaqiError::Http(status.as_u16()),
            None => WaqiError::Request(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for WaqiError {
    fn from(err: serde_json::Error) -> Self {
        WaqiError::Parse(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn beijing() -> Bounds {
        Bounds::default()
    }

    #[test]
    fn test_valid_bounds_pass_validation() {
        assert!(beijing().validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let b = Bounds { lat1: 40.4, lng1: 115.9, lat2: 39.4, lng2: 117.0 };
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let b = Bounds { lat1: -95.0, lng1: 0.0, lat2: 10.0, lng2: 10.0 };
        assert!(b.validate().is_err());
        let b = Bounds { lat1: 0.0, lng1: 0.0, lat2: 10.0, lng2: 190.0 };
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_bounds_contains_is_inclusive() {
        let b = beijing();
        assert!(b.contains(39.9, 116.4));
        assert!(b.contains(39.4, 115.9));
        assert!(!b.contains(41.0, 116.4));
    }

    #[test]
    fn test_error_display_matches_log_classification_prefixes() {
        assert_eq!(WaqiError::Http(503).to_string(), "HTTP error: 503");
        assert!(WaqiError::Parse("x".into()).to_string().starts_with("Parse error"));
        assert_eq!(WaqiError::StationNotFound(7).to_string(), "Station not found: 7");
    }

    #[test]
    fn test_invalid_key_is_auth_failure() {
        assert!(WaqiError::Api("Invalid key".into()).is_auth_failure());
        assert!(!WaqiError::Api("Unknown station".into()).is_auth_failure());
        assert!(!WaqiError::Http(401).is_auth_failure());
    }
}
