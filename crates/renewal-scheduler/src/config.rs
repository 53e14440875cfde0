//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use renewal_types::ScheduleSettings;

use crate::SchedulerError;

/// Configuration for the scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default timezone for jobs (IANA name, e.g. "Europe/London")
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Seconds running jobs get to observe cancellation on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl From<&ScheduleSettings> for SchedulerConfig {
    fn from(settings: &ScheduleSettings) -> Self {
        Self {
            default_timezone: settings.timezone.clone(),
            ..Self::default()
        }
    }
}

impl SchedulerConfig {
    /// Parse the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidTimezone` if the name is not a valid
    /// IANA timezone identifier.
    pub fn parse_timezone(&self) -> Result<chrono_tz::Tz, SchedulerError> {
        self.default_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| SchedulerError::InvalidTimezone(self.default_timezone.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.shutdown_timeout_secs, 5);
        assert_eq!(config.parse_timezone().unwrap().name(), "UTC");
    }

    #[test]
    fn test_from_schedule_settings() {
        let settings = ScheduleSettings {
            cron: "0 0 3 * * *".to_string(),
            timezone: "Australia/Sydney".to_string(),
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.parse_timezone().unwrap().name(), "Australia/Sydney");
    }

    #[test]
    fn test_parse_invalid_timezone() {
        let config = SchedulerConfig {
            default_timezone: "Invalid/Zone".to_string(),
            ..Default::default()
        };
        match config.parse_timezone() {
            Err(SchedulerError::InvalidTimezone(tz)) => assert_eq!(tz, "Invalid/Zone"),
            other => panic!("Expected InvalidTimezone error, got {other:?}"),
        }
    }
}
