//! Scheduler service wrapper around tokio-cron-scheduler.
//!
//! Provides lifecycle management for scheduled jobs with graceful
//! shutdown and status recording.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::{JobError, JobOutput, JobRegistry, JobResult};
use crate::{SchedulerConfig, SchedulerError};

/// Validate a cron expression.
///
/// The expression uses 6-field format: second minute hour day-of-month
/// month day-of-week.
///
/// # Example
///
/// ```
/// use renewal_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 0 2 * * *").is_ok()); // 2 AM daily
/// assert!(validate_cron_expression("invalid").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    match Job::new_async(expr, |_uuid, _lock| Box::pin(async {})) {
        Ok(_) => Ok(()),
        Err(e) => Err(SchedulerError::InvalidCron(format!("'{}': {}", expr, e))),
    }
}

/// Run one job execution and record it in the registry.
///
/// Used by cron-triggered runs and by callers that trigger a job by hand.
pub async fn run_recorded<Fut>(registry: &JobRegistry, name: &str, job: Fut) -> JobResult
where
    Fut: Future<Output = Result<JobOutput, JobError>>,
{
    registry.record_start(name);
    let start = std::time::Instant::now();

    let (result, metadata) = match job.await {
        Ok(output) => (JobResult::Success, output.metadata),
        Err(err) => (JobResult::from(err), Default::default()),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        JobResult::Success => info!(job = %name, duration_ms, "Job completed"),
        JobResult::Skipped(reason) => info!(job = %name, reason = %reason, "Job skipped"),
        JobResult::Failed(reason) => warn!(job = %name, error = %reason, duration_ms, "Job failed"),
    }
    registry.record_complete_with_metadata(name, result.clone(), duration_ms, metadata);
    result
}

/// Service wrapper around JobScheduler for lifecycle management.
///
/// Jobs receive a child of the service's shutdown token so that
/// `shutdown()` reaches runs that are in flight.
pub struct SchedulerService {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a new scheduler service. Call `start()` to begin executing jobs.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.parse_timezone()?;

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            registry: Arc::new(JobRegistry::new()),
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    /// Start the scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if already started.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.scheduler.start().await?;
        info!("Scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler gracefully.
    ///
    /// Cancels the shutdown token, gives running jobs the configured grace
    /// period, then stops the scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if not started.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        let grace = std::time::Duration::from_secs(self.config.shutdown_timeout_secs);
        let deadline = tokio::time::Instant::now() + grace;
        while self.registry.get_all_status().iter().any(|s| s.is_running)
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");
        Ok(())
    }

    /// Clone of the shutdown token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Whether the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Registry holding the status of every registered job.
    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Get the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add a timezone-aware cron job.
    ///
    /// The job receives a child of the shutdown token. `timezone` falls back
    /// to the configured default.
    ///
    /// # Errors
    ///
    /// Returns error if the cron expression or timezone is invalid.
    pub async fn add_cron_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        job_fn: F,
    ) -> Result<uuid::Uuid, SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let tz: Tz = match timezone {
            Some(tz_str) => Self::parse_timezone(tz_str)?,
            None => self.config.parse_timezone()?,
        };

        validate_cron_expression(cron_expr)?;

        let shutdown_token = self.shutdown_token.clone();
        let job = Job::new_async_tz(cron_expr, tz, move |_uuid, _lock| {
            let token = shutdown_token.child_token();
            let job_fn = job_fn.clone();
            Box::pin(async move { job_fn(token).await })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let uuid = self.scheduler.add(job).await?;
        info!(
            job = %name,
            uuid = %uuid,
            cron = %cron_expr,
            timezone = %tz.name(),
            "Job registered"
        );
        Ok(uuid)
    }

    /// Add a cron job whose runs are recorded in the registry.
    ///
    /// `job_fn` reports success with a [`JobOutput`] or a [`JobError`]
    /// distinguishing skipped runs from failures.
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        job_fn: F,
    ) -> Result<uuid::Uuid, SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutput, JobError>> + Send,
    {
        let registry = self.registry.clone();
        let job_name = name.to_string();
        let uuid = self
            .add_cron_job(name, cron_expr, timezone, move |token| {
                let registry = registry.clone();
                let job_name = job_name.clone();
                let job_fn = job_fn.clone();
                async move {
                    run_recorded(&registry, &job_name, job_fn(token)).await;
                }
            })
            .await?;

        self.registry.register(name, cron_expr);
        Ok(uuid)
    }

    /// Parse an IANA timezone name.
    pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
        tz_str
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
    }
}
