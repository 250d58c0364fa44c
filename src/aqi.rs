/// US EPA PM2.5 → AQI derivation.
///
/// The index is a piecewise-linear function of concentration defined by a
/// fixed breakpoint table. Everything in this module is pure: no state, no
/// I/O, and absent or invalid input yields `None` rather than an error.
///
/// Index resolution order for a station reading:
///   1. an index supplied directly by the upstream provider, if numeric
///   2. otherwise, the index derived from the PM2.5 concentration
///   3. otherwise, no value

use serde::Serialize;
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Index type
// ---------------------------------------------------------------------------

/// Maximum representable index. Anything beyond the top band clamps here.
pub const AQI_MAX: u16 = 500;

/// An Air Quality Index value, always within `0..=AQI_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Aqi(u16);

impl Aqi {
    /// Builds an index, clamping values above `AQI_MAX`.
    pub fn new(value: u16) -> Self {
        Aqi(value.min(AQI_MAX))
    }

    /// Accepts an index reported by the upstream provider.
    ///
    /// Negative values are not a valid index and yield `None`; values above
    /// the scale clamp to `AQI_MAX`.
    pub fn from_upstream(value: i64) -> Option<Self> {
        if value < 0 {
            return None;
        }
        Some(Aqi(value.min(i64::from(AQI_MAX)) as u16))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Aqi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Breakpoint table
// ---------------------------------------------------------------------------

/// One row of the breakpoint table: a concentration band (µg/m³) and the
/// index band it maps onto. Both ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub conc_lo: f64,
    pub conc_hi: f64,
    pub index_lo: u16,
    pub index_hi: u16,
}

/// US EPA PM2.5 breakpoints, ascending.
pub static PM25_BREAKPOINTS: &[Breakpoint] = &[
    Breakpoint { conc_lo: 0.0, conc_hi: 12.0, index_lo: 0, index_hi: 50 },
    Breakpoint { conc_lo: 12.1, conc_hi: 35.4, index_lo: 51, index_hi: 100 },
    Breakpoint { conc_lo: 35.5, conc_hi: 55.4, index_lo: 101, index_hi: 150 },
    Breakpoint { conc_lo: 55.5, conc_hi: 150.4, index_lo: 151, index_hi: 200 },
    Breakpoint { conc_lo: 150.5, conc_hi: 250.4, index_lo: 201, index_hi: 300 },
    Breakpoint { conc_lo: 250.5, conc_hi: 500.4, index_lo: 301, index_hi: 500 },
];

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Converts a PM2.5 concentration (µg/m³) into an AQI.
///
/// The band is the first one whose upper concentration bound is at or above
/// the input, so a value falling between two published bands (e.g. 12.05) is
/// interpolated in the upper band and rounds to its lowest index. Rounding is
/// half away from zero. Concentrations above the top band clamp to 500.
///
/// Returns `None` for absent, negative, NaN or infinite input.
pub fn derive_from_pm25(concentration: Option<f64>) -> Option<Aqi> {
    let c = concentration?;
    if !c.is_finite() || c < 0.0 {
        return None;
    }

    let Some(bp) = PM25_BREAKPOINTS.iter().find(|bp| c <= bp.conc_hi) else {
        return Some(Aqi(AQI_MAX));
    };

    let index_span = f64::from(bp.index_hi - bp.index_lo);
    let conc_span = bp.conc_hi - bp.conc_lo;
    let index = (index_span / conc_span * (c - bp.conc_lo) + f64::from(bp.index_lo)).round();

    // Gap values interpolate slightly below index_lo but never below zero.
    Some(Aqi::new(index.max(0.0) as u16))
}

/// Picks the index to display for a reading: the upstream index when it is
/// present and usable, otherwise the one derived from PM2.5.
pub fn resolve_aqi(upstream: Option<i64>, pm25: Option<f64>) -> Option<Aqi> {
    upstream
        .and_then(Aqi::from_upstream)
        .or_else(|| derive_from_pm25(pm25))
}

// ---------------------------------------------------------------------------
// Loose upstream values
// ---------------------------------------------------------------------------

/// Reads a concentration from a loosely-typed JSON value.
///
/// Accepts numbers and numeric strings; anything else, including negative or
/// non-finite numbers, yields `None`.
pub fn parse_concentration(value: &Value) -> Option<f64> {
    let c = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (c.is_finite() && c >= 0.0).then_some(c)
}

/// Reads an upstream index from a loosely-typed JSON value.
///
/// WAQI reports the index as a number, a numeric string, or `"-"` when the
/// station has no current value. Fractional values are rounded. Negative
/// values are absent, so `-0.4` does not round up to a valid zero.
pub fn parse_upstream_index(value: &Value) -> Option<i64> {
    let index = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (index.is_finite() && index >= 0.0).then(|| index.round() as i64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
