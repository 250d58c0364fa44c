/// Upstream data providers.
///
/// Submodules:
/// - `waqi`: World Air Quality Index project API (api.waqi.info).

pub mod waqi;
