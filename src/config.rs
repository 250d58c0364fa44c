/// Service configuration.
///
/// Settings come from a TOML file (default `aqimon.toml`). The WAQI token is
/// a secret, so it is normally kept out of the file and supplied through the
/// `WAQI_TOKEN` environment variable or a `.env` file instead; when present
/// the environment value overrides the file.
///
/// Every section and key is optional and falls back to the defaults below.

use crate::logging::LogLevel;
use crate::model::Bounds;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "aqimon.toml";
pub const TOKEN_ENV_VAR: &str = "WAQI_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaqiConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for WaqiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.waqi.info".to_string(),
            token: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between polling cycles.
    pub interval_secs: u64,
    /// Observations older than this are flagged stale on the map.
    pub stale_after_minutes: u64,
    /// Upper bound on per-station feed calls in one cycle.
    pub max_enriched_stations: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            stale_after_minutes: 120,
            max_enriched_stations: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub waqi: WaqiConfig,
    pub map: Bounds,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            waqi: WaqiConfig::default(),
            map: Bounds::default(),
            refresh: RefreshConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parse config from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load config from `path`, then apply `.env` and the token override.
    ///
    /// A missing file is not an error: defaults are used so the service can
    /// run with nothing but `WAQI_TOKEN` set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        dotenv::dotenv().ok();
        config.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());
        Ok(config)
    }

    /// Replace the token when a non-empty override is supplied.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            self.waqi.token = token;
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.waqi.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no WAQI token: set waqi.token or {}",
                TOKEN_ENV_VAR
            )));
        }
        if !self.waqi.base_url.starts_with("http://") && !self.waqi.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "waqi.base_url must be an http(s) URL, got '{}'",
                self.waqi.base_url
            )));
        }
        if self.waqi.timeout_secs == 0 {
            return Err(ConfigError::Invalid("waqi.timeout_secs must be positive".into()));
        }
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh.interval_secs must be positive".into()));
        }
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level '{}'",
                self.logging.level
            )));
        }
        self.map
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("map: {}", e)))
    }

    /// Configured log level, defaulting to `Info` when unparseable.
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.logging.level).unwrap_or(LogLevel::Info)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut c = Config::default();
        c.waqi.token = "demo".to_string();
        c
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml("").expect("empty TOML is valid");
        assert_eq!(config, Config::default());
        assert_eq!(config.waqi.base_url, "https://api.waqi.info");
        assert_eq!(config.refresh.interval_secs, 600);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_keys() {
        let config = Config::from_toml(
            r#"
            [waqi]
            token = "abc123"

            [map]
            lat1 = 51.2
            lng1 = -0.6
            lat2 = 51.8
            lng2 = 0.4

            [refresh]
            interval_secs = 300

            [logging]
            level = "debug"
            file = "/var/log/aqimon.log"
            "#,
        )
        .expect("valid TOML");

        assert_eq!(config.waqi.token, "abc123");
        assert_eq!(config.waqi.timeout_secs, 10);
        assert_eq!(config.map.lat2, 51.8);
        assert_eq!(config.refresh.interval_secs, 300);
        assert_eq!(config.refresh.stale_after_minutes, 120);
        assert_eq!(config.log_level(), LogLevel::Debug);
        assert_eq!(config.logging.file.as_deref(), Some("/var/log/aqimon.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = Config::from_toml("[waqi\ntoken = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/aqimon.toml"))
            .expect("missing file is not an error");
        assert_eq!(config.refresh, RefreshConfig::default());
    }

    #[test]
    fn test_partial_map_section_keeps_default_corners() {
        let config = Config::from_toml("[map]\nlat1 = 10.0\n").expect("partial [map] is valid");
        let default = Bounds::default();
        assert_eq!(config.map.lat1, 10.0);
        assert_eq!(config.map.lng1, default.lng1);
        assert_eq!(config.map.lat2, default.lat2);
        assert_eq!(config.map.lng2, default.lng2);
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        // A directory exists but cannot be read as a file.
        let dir = std::env::temp_dir();
        let err = Config::load(&dir).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "got {:?}", err);
        assert!(err.to_string().contains(&dir.display().to_string()));
    }

    #[test]
    fn test_token_override_replaces_file_value() {
        let mut config = valid();
        config.apply_token_override(Some("from-env".into()));
        assert_eq!(config.waqi.token, "from-env");

        config.apply_token_override(Some("   ".into()));
        assert_eq!(config.waqi.token, "from-env", "blank override is ignored");

        config.apply_token_override(None);
        assert_eq!(config.waqi.token, "from-env");
    }

    #[test]
    fn test_validate_rejects_missing_token() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains(TOKEN_ENV_VAR));
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_bad_bounds() {
        let mut c = valid();
        c.refresh.interval_secs = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.map = Bounds { lat1: 10.0, lng1: 0.0, lat2: 5.0, lng2: 1.0 };
        assert!(c.validate().is_err());

        let mut c = valid();
        c.logging.level = "loud".into();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.waqi.base_url = "api.waqi.info".into();
        assert!(c.validate().is_err());
    }
}
