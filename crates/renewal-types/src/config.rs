//! Configuration loading for the renewal engine.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/renewal-engine/config.toml.
//!
//! Policy defaults (capacity, lookahead, lead time) are only defaults:
//! every engine call receives them as explicit parameters.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RenewalError;
use crate::RecordSource;

/// Generation policy defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum roster size per generated session
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// How far ahead (days) upcoming expiries are considered
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,

    /// Lead time: how many days before expiry a session should occur
    #[serde(default = "default_days_before_expiry")]
    pub days_before_expiry: u32,

    /// Location stamped on generated sessions
    #[serde(default = "default_location")]
    pub location: String,

    /// Station code stamped on generated sessions
    #[serde(default)]
    pub airport: Option<String>,

    /// Record collection to generate from
    #[serde(default)]
    pub source_type: RecordSource,

    /// Upper bound for one generation run, in seconds
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

fn default_capacity() -> u32 {
    15
}

fn default_lookahead_days() -> u32 {
    90
}

fn default_days_before_expiry() -> u32 {
    30
}

fn default_location() -> String {
    "Training Room".to_string()
}

fn default_run_timeout() -> u64 {
    60
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            lookahead_days: default_lookahead_days(),
            days_before_expiry: default_days_before_expiry(),
            location: default_location(),
            airport: None,
            source_type: RecordSource::default(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

/// Retry policy for storage I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff interval (ms)
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    /// Cap for a single backoff interval (ms)
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,

    /// Give up once this much time has been spent retrying (ms)
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_interval() -> u64 {
    200
}

fn default_max_interval() -> u64 {
    5_000
}

fn default_max_elapsed() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
            max_elapsed_ms: default_max_elapsed(),
        }
    }
}

/// Cron schedule for the unattended generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// 6-field cron expression (default: 2 AM daily)
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone for the cron expression
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            timezone: default_timezone(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory of the RocksDB store
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Generation policy defaults
    #[serde(default)]
    pub engine: EngineSettings,

    /// Storage retry policy
    #[serde(default)]
    pub retry: RetrySettings,

    /// Unattended job schedule
    #[serde(default)]
    pub schedule: ScheduleSettings,
}

fn default_data_path() -> String {
    ProjectDirs::from("", "", "renewal-engine")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./renewal-db"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            log_level: default_log_level(),
            engine: EngineSettings::default(),
            retry: RetrySettings::default(),
            schedule: ScheduleSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/renewal-engine/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (RENEWAL_*, nested keys joined with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RenewalError> {
        let config_dir = ProjectDirs::from("", "", "renewal-engine")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("data_path", default_data_path())
            .map_err(|e| RenewalError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| RenewalError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: RENEWAL_LOG_LEVEL, RENEWAL_ENGINE__CAPACITY, RENEWAL_SCHEDULE__CRON
        builder = builder.add_source(
            Environment::with_prefix("RENEWAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| RenewalError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| RenewalError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), RenewalError> {
        if self.engine.capacity == 0 {
            return Err(RenewalError::Config("engine.capacity must be >= 1".to_string()));
        }
        if self.engine.run_timeout_secs == 0 {
            return Err(RenewalError::Config(
                "engine.run_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RenewalError::Config("retry.max_attempts must be > 0".to_string()));
        }
        Ok(())
    }

    /// Expand ~ in data_path to the home directory
    pub fn expanded_data_path(&self) -> PathBuf {
        if let Some(rest) = self.data_path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(&self.data_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.engine.capacity, 15);
        assert_eq!(settings.engine.lookahead_days, 90);
        assert_eq!(settings.engine.days_before_expiry, 30);
        assert_eq!(settings.engine.source_type, RecordSource::Certificates);
        assert_eq!(settings.schedule.cron, "0 0 2 * * *");
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[engine]
capacity = 10
location = "Hangar 2"
source_type = "training_records"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(&file.path().to_string_lossy())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.engine.capacity, 10);
        assert_eq!(settings.engine.location, "Hangar 2");
        assert_eq!(settings.engine.source_type, RecordSource::TrainingRecords);
        // Unspecified values keep their defaults
        assert_eq!(settings.engine.lookahead_days, 90);
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_rejects_zero_capacity() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[engine]\ncapacity = 0").unwrap();

        let result = Settings::load(Some(&file.path().to_string_lossy()));
        assert!(matches!(result, Err(RenewalError::Config(_))));
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.retry.max_attempts = 0;
        assert!(settings.validate().is_err());

        settings.retry.max_attempts = 1;
        settings.engine.run_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_expanded_data_path_plain() {
        let settings = Settings {
            data_path: "/var/lib/renewals.json".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.expanded_data_path(),
            PathBuf::from("/var/lib/renewals.json")
        );
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let decoded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.engine.capacity, settings.engine.capacity);
        assert_eq!(decoded.schedule.timezone, "UTC");
    }
}
