//! Scheduler errors.

use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron backend refused an operation
    #[error("Cron backend error: {0}")]
    Scheduler(String),

    /// Six-field cron expression did not parse
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    /// Not an IANA timezone name
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Renewal scheduler already started")]
    AlreadyRunning,

    #[error("Renewal scheduler not started")]
    NotRunning,
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        Self::Scheduler(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_messages() {
        assert_eq!(
            SchedulerError::AlreadyRunning.to_string(),
            "Renewal scheduler already started"
        );
        assert_eq!(
            SchedulerError::NotRunning.to_string(),
            "Renewal scheduler not started"
        );
    }

    #[test]
    fn test_config_messages_carry_input() {
        let err = SchedulerError::InvalidTimezone("Mars/Olympus".to_string());
        assert_eq!(err.to_string(), "Invalid timezone: Mars/Olympus");

        let err = SchedulerError::InvalidCron("'0 0 2 * *': too few fields".to_string());
        assert!(err.to_string().ends_with("too few fields"));
    }
}
