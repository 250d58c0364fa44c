/// Health-risk banding and reading freshness.
///
/// Submodules:
/// - `categories`: AQI → severity category, label and display colour.
/// - `stalenesses`: whether a station's latest observation is too old.

pub mod categories;
pub mod stalenesses;
