//! Scheduled renewal session generation.
//!
//! Runs a full generation over every requirement with the configured policy
//! defaults. A run that finds another generation holding the lock is
//! recorded as skipped; so is a run cancelled by scheduler shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use renewal_engine::{EngineError, GenerateRequest, RegenerationCoordinator, RunControl};
use renewal_types::Settings;

use crate::registry::{JobError, JobOutput};
use crate::{SchedulerError, SchedulerService};

/// Registry name of the generation job.
pub const RENEWAL_JOB_NAME: &str = "renewal_generation";

/// Configuration for the scheduled generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalJobConfig {
    /// Cron expression (default: "0 0 2 * * *" = 2 AM daily)
    pub cron: String,

    /// Timezone (default: "UTC")
    pub timezone: String,

    /// Generation parameters for each run
    pub request: GenerateRequest,

    /// Run timeout in seconds
    pub timeout_secs: u64,
}

impl RenewalJobConfig {
    /// Job configuration from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cron: settings.schedule.cron.clone(),
            timezone: settings.schedule.timezone.clone(),
            request: GenerateRequest::from_settings(&settings.engine),
            timeout_secs: settings.engine.run_timeout_secs,
        }
    }
}

impl Default for RenewalJobConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Register the generation job with the scheduler.
///
/// # Errors
///
/// Returns error if job registration fails (invalid cron, invalid timezone).
pub async fn create_renewal_job(
    scheduler: &SchedulerService,
    coordinator: Arc<RegenerationCoordinator>,
    config: RenewalJobConfig,
) -> Result<(), SchedulerError> {
    let cron = config.cron.clone();
    let timezone = config.timezone.clone();
    let config = Arc::new(config);

    scheduler
        .register_job(RENEWAL_JOB_NAME, &cron, Some(&timezone), move |token| {
            let coordinator = coordinator.clone();
            let config = config.clone();
            async move { run_renewal(&coordinator, &config, token).await }
        })
        .await?;

    info!(cron = %cron, timezone = %timezone, "Registered renewal generation job");
    Ok(())
}

/// Execute one generation run as a job.
pub async fn run_renewal(
    coordinator: &RegenerationCoordinator,
    config: &RenewalJobConfig,
    cancel: CancellationToken,
) -> Result<JobOutput, JobError> {
    let control = RunControl::new(Duration::from_secs(config.timeout_secs)).with_cancel(cancel);

    match coordinator
        .generate(config.request.clone(), Utc::now(), control)
        .await
    {
        Ok(summary) => Ok(JobOutput::new()
            .with_metadata("generated_count", summary.generated_count)
            .with_metadata("assigned_count", summary.assigned_count)
            .with_metadata("deleted_count", summary.deleted_count)
            .with_metadata("preserved_count", summary.preserved_count)
            .with_metadata(
                "unassigned_instructor_count",
                summary.unassigned_instructor_count,
            )),
        Err(e @ EngineError::LockContention(_)) => Err(JobError::Skipped(e.to_string())),
        Err(e @ EngineError::Cancelled { .. }) => Err(JobError::Skipped(e.to_string())),
        Err(e) => Err(JobError::Failed(e.to_string())),
    }
}
