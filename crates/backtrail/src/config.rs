//! Configuration management for backtrail.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "backtrail";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "locations.db";

/// Default gpsd TCP port.
pub const DEFAULT_GPSD_PORT: u16 = 2947;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BACKTRAIL_`, sections split on `__`)
/// 2. TOML config file at `~/.config/backtrail/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Location source configuration.
    pub location: LocationConfig,
    /// gpsd provider configuration.
    pub gpsd: GpsdConfig,
    /// Replay provider configuration.
    pub replay: ReplayConfig,
    /// Display configuration.
    pub display: DisplayConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/backtrail/locations.db`
    pub database_path: Option<PathBuf>,
}

/// Which location provider feeds the recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Live fixes from a gpsd daemon.
    #[default]
    Gpsd,
    /// Fixes replayed from a JSON Lines file.
    Replay,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gpsd => write!(f, "gpsd"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// Location-source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// The provider to record from.
    pub provider: ProviderKind,
    /// Minimum distance in meters between delivered fixes.
    /// Set to 0 to deliver every fix.
    pub significant_distance_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            significant_distance_m: 500.0,
        }
    }
}

/// gpsd connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsdConfig {
    /// Host gpsd listens on.
    pub host: String,
    /// TCP port gpsd listens on.
    pub port: u16,
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_GPSD_PORT,
        }
    }
}

/// How the replay provider answers permission prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAnswer {
    /// Grant "when in use", then "always" when asked.
    #[default]
    Always,
    /// Grant "when in use" but decline the "always" upgrade.
    WhenInUse,
    /// Deny location access.
    Deny,
}

/// Replay provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSON Lines file of fixes to replay.
    pub path: Option<PathBuf>,
    /// Delay between delivered batches in milliseconds.
    pub interval_ms: u64,
    /// Simulated user answer to permission prompts.
    pub grant: PermissionAnswer,
    /// Whether the simulated device supports significant-change monitoring.
    pub significant_change_available: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval_ms: 1000,
            grant: PermissionAnswer::default(),
            significant_change_available: true,
        }
    }
}

/// Display settings for the terminal view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render timestamps in UTC instead of local time.
    pub utc: bool,
    /// Stroke color of the trail polyline.
    pub trail_color: String,
    /// Stroke width of the trail polyline.
    pub trail_width: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc: false,
            trail_color: "blue".to_string(),
            trail_width: 4.0,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// The result is not validated: command-line overrides may still change
    /// it. Call [`Self::validate`] once they are applied.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("BACKTRAIL_").split("__"));

        Ok(figment.extract()?)
    }

    /// Apply `record` command-line overrides. A replay path implies the
    /// replay provider.
    pub fn override_provider(
        &mut self,
        provider: Option<ProviderKind>,
        replay_path: Option<PathBuf>,
    ) {
        if let Some(provider) = provider {
            self.location.provider = provider;
        }
        if let Some(path) = replay_path {
            self.location.provider = ProviderKind::Replay;
            self.replay.path = Some(path);
        }
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let distance = self.location.significant_distance_m;
        if !distance.is_finite() || distance < 0.0 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "location.significant_distance_m must be a non-negative number, got {distance}"
                ),
            });
        }

        if self.gpsd.port == 0 {
            return Err(Error::ConfigValidation {
                message: "gpsd.port must be greater than 0".to_string(),
            });
        }

        if self.location.provider == ProviderKind::Replay && self.replay.path.is_none() {
            return Err(Error::ConfigValidation {
                message: "replay.path is required when location.provider is \"replay\""
                    .to_string(),
            });
        }

        let width = self.display.trail_width;
        if !width.is_finite() || width <= 0.0 {
            return Err(Error::ConfigValidation {
                message: format!("display.trail_width must be positive, got {width}"),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the gpsd address as `host:port`.
    #[must_use]
    pub fn gpsd_address(&self) -> String {
        format!("{}:{}", self.gpsd.host, self.gpsd.port)
    }

    /// Get the replay pacing as a Duration.
    #[must_use]
    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.location.provider, ProviderKind::Gpsd);
        assert!((config.location.significant_distance_m - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.gpsd.port, DEFAULT_GPSD_PORT);
        assert!(config.replay.significant_change_available);
        assert!(!config.display.utc);
    }

    #[test]
    fn test_default_display_config() {
        let display = DisplayConfig::default();

        assert_eq!(display.trail_color, "blue");
        assert!((display.trail_width - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_replay_config() {
        let replay = ReplayConfig::default();

        assert!(replay.path.is_none());
        assert_eq!(replay.interval_ms, 1000);
        assert_eq!(replay.grant, PermissionAnswer::Always);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_negative_distance() {
        let mut config = Config::default();
        config.location.significant_distance_m = -1.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("significant_distance_m"));
    }

    #[test]
    fn test_validate_nan_distance() {
        let mut config = Config::default();
        config.location.significant_distance_m = f64::NAN;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_distance_allowed() {
        let mut config = Config::default();
        config.location.significant_distance_m = 0.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.gpsd.port = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("gpsd.port"));
    }

    #[test]
    fn test_validate_replay_requires_path() {
        let mut config = Config::default();
        config.location.provider = ProviderKind::Replay;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("replay.path"));

        config.replay.path = Some(PathBuf::from("/tmp/fixes.jsonl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_trail_width() {
        let mut config = Config::default();
        config.display.trail_width = 0.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("trail_width"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("locations.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_gpsd_address() {
        assert_eq!(Config::default().gpsd_address(), "127.0.0.1:2947");
    }

    #[test]
    fn test_replay_interval() {
        assert_eq!(Config::default().replay_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("backtrail"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "backtrail_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[location]
provider = "replay"
significant_distance_m = 100.0

[replay]
path = "/tmp/drive.jsonl"
grant = "when_in_use"

[display]
utc = true
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.location.provider, ProviderKind::Replay);
        assert_eq!(config.replay.grant, PermissionAnswer::WhenInUse);
        assert_eq!(config.replay.path, Some(PathBuf::from("/tmp/drive.jsonl")));
        assert!(config.display.utc);
        assert_eq!(config.gpsd, GpsdConfig::default());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::Gpsd.to_string(), "gpsd");
        assert_eq!(ProviderKind::Replay.to_string(), "replay");
    }

    #[test]
    fn test_permission_answer_deserialize() {
        let answer: PermissionAnswer = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(answer, PermissionAnswer::Deny);
    }

    fn write_temp_config(tag: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "backtrail_config_{tag}_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_does_not_validate() {
        let path = write_temp_config("replay_no_path", "[location]\nprovider = \"replay\"\n");

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.location.provider, ProviderKind::Replay);
        assert!(config.validate().is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_replay_override_fixes_incomplete_file_config() {
        let path = write_temp_config("replay_override", "[location]\nprovider = \"replay\"\n");

        let mut config = Config::load_from(Some(path.clone())).unwrap();
        config.override_provider(None, Some(PathBuf::from("trip.jsonl")));

        assert!(config.validate().is_ok());
        assert_eq!(config.replay.path, Some(PathBuf::from("trip.jsonl")));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_provider_override_replaces_file_choice() {
        let path = write_temp_config("gpsd_override", "[location]\nprovider = \"replay\"\n");

        let mut config = Config::load_from(Some(path.clone())).unwrap();
        config.override_provider(Some(ProviderKind::Gpsd), None);

        assert_eq!(config.location.provider, ProviderKind::Gpsd);
        assert!(config.validate().is_ok());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_replay_path_wins_over_provider_flag() {
        let mut config = Config::default();
        config.override_provider(Some(ProviderKind::Gpsd), Some(PathBuf::from("a.jsonl")));
        assert_eq!(config.location.provider, ProviderKind::Replay);
    }
}
