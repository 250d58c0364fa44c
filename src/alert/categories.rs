//! AQI severity classification.
//!
//! Six ordered bands partition `0..=500` with inclusive upper bounds at
//! 50, 100, 150, 200 and 300. A missing index classifies as `NoData`, which
//! is a normal outcome for stations without a current reading.

use crate::aqi::{AQI_MAX, Aqi};
use serde::Serialize;

/// AQI health-risk bands, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeverityCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl SeverityCategory {
    /// All categories, lowest band first.
    pub const ALL: [SeverityCategory; 6] = [
        SeverityCategory::Good,
        SeverityCategory::Moderate,
        SeverityCategory::UnhealthyForSensitiveGroups,
        SeverityCategory::Unhealthy,
        SeverityCategory::VeryUnhealthy,
        SeverityCategory::Hazardous,
    ];

    /// Inclusive index range covered by this band.
    pub fn index_range(self) -> (u16, u16) {
        match self {
            SeverityCategory::Good => (0, 50),
            SeverityCategory::Moderate => (51, 100),
            SeverityCategory::UnhealthyForSensitiveGroups => (101, 150),
            SeverityCategory::Unhealthy => (151, 200),
            SeverityCategory::VeryUnhealthy => (201, 300),
            SeverityCategory::Hazardous => (301, AQI_MAX),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityCategory::Good => "Good",
            SeverityCategory::Moderate => "Moderate",
            SeverityCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            SeverityCategory::Unhealthy => "Unhealthy",
            SeverityCategory::VeryUnhealthy => "Very Unhealthy",
            SeverityCategory::Hazardous => "Hazardous",
        }
    }

    /// Display colour (hex RGB) used for map markers.
    pub fn color(self) -> &'static str {
        match self {
            SeverityCategory::Good => "#00e400",
            SeverityCategory::Moderate => "#ffff00",
            SeverityCategory::UnhealthyForSensitiveGroups => "#ff7e00",
            SeverityCategory::Unhealthy => "#ff0000",
            SeverityCategory::VeryUnhealthy => "#8f3f97",
            SeverityCategory::Hazardous => "#7e0023",
        }
    }
}

/// Result of classifying a possibly-absent index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    Rated(SeverityCategory),
    NoData,
}

pub const NO_DATA_LABEL: &str = "No Data";
pub const NO_DATA_COLOR: &str = "#aaaaaa";

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::Rated(c) => c.label(),
            Classification::NoData => NO_DATA_LABEL,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Classification::Rated(c) => c.color(),
            Classification::NoData => NO_DATA_COLOR,
        }
    }

    pub fn category(self) -> Option<SeverityCategory> {
        match self {
            Classification::Rated(c) => Some(c),
            Classification::NoData => None,
        }
    }
}

/// Maps an index onto its severity band.
pub fn category_for(aqi: Aqi) -> SeverityCategory {
    match aqi.value() {
        0..=50 => SeverityCategory::Good,
        51..=100 => SeverityCategory::Moderate,
        101..=150 => SeverityCategory::UnhealthyForSensitiveGroups,
        151..=200 => SeverityCategory::Unhealthy,
        201..=300 => SeverityCategory::VeryUnhealthy,
        _ => SeverityCategory::Hazardous,
    }
}

/// Classifies an optional index; `None` yields `Classification::NoData`.
pub fn classify(aqi: Option<Aqi>) -> Classification {
    aqi.map_or(Classification::NoData, |a| Classification::Rated(category_for(a)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
