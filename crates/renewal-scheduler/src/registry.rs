//! Job registry for tracking scheduled run status.
//!
//! The `JobRegistry` records, per job, the last run time, duration, result
//! and counts, plus the metadata the last run reported (session and member
//! counts for renewal generation).

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    /// Job completed successfully
    Success,
    /// Job failed with an error message
    Failed(String),
    /// Job did no work, e.g. another run held the scope lock
    Skipped(String),
}

/// Why a job run did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Nothing was attempted; not counted as an error
    Skipped(String),
    /// The run failed
    Failed(String),
}

impl From<JobError> for JobResult {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Skipped(reason) => JobResult::Skipped(reason),
            JobError::Failed(reason) => JobResult::Failed(reason),
        }
    }
}

/// Stats a job reports back to the registry.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    /// Arbitrary key-value metadata from the job run.
    pub metadata: HashMap<String, String>,
}

impl JobOutput {
    /// Create a new empty job output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    pub cron_expr: String,
    /// When the job last finished
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    pub run_count: u64,
    pub error_count: u64,
    pub is_running: bool,
    /// Metadata reported by the last run
    #[serde(default)]
    pub last_run_metadata: HashMap<String, String>,
}

impl JobStatus {
    fn new(job_name: &str, cron_expr: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            cron_expr: cron_expr.to_string(),
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            run_count: 0,
            error_count: 0,
            is_running: false,
            last_run_metadata: HashMap::new(),
        }
    }
}

/// Thread-safe registry of job status.
///
/// # Example
///
/// ```
/// use renewal_scheduler::{JobRegistry, JobResult};
///
/// let registry = JobRegistry::new();
/// registry.register("renewal_generation", "0 0 2 * * *");
///
/// registry.record_start("renewal_generation");
/// assert!(registry.is_running("renewal_generation"));
///
/// registry.record_complete("renewal_generation", JobResult::Success, 1500);
/// assert!(!registry.is_running("renewal_generation"));
/// ```
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    /// Create a new empty job registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a job. An existing entry with the same name is replaced.
    pub fn register(&self, job_name: &str, cron_expr: &str) {
        self.write()
            .insert(job_name.to_string(), JobStatus::new(job_name, cron_expr));
    }

    /// Record that a job has started executing.
    pub fn record_start(&self, job_name: &str) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = true;
        }
    }

    /// Record that a job has completed.
    pub fn record_complete(&self, job_name: &str, result: JobResult, duration_ms: u64) {
        self.record_complete_with_metadata(job_name, result, duration_ms, HashMap::new());
    }

    /// Record that a job has completed, keeping the metadata it reported.
    pub fn record_complete_with_metadata(
        &self,
        job_name: &str,
        result: JobResult,
        duration_ms: u64,
        metadata: HashMap<String, String>,
    ) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = false;
            status.last_run = Some(Utc::now());
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            if matches!(result, JobResult::Failed(_)) {
                status.error_count += 1;
            }
            status.last_result = Some(result);
            status.last_run_metadata = metadata;
        }
    }

    /// Status of one job, `None` if unregistered.
    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.read().get(job_name).cloned()
    }

    /// Status of every registered job, ordered by name.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        all
    }

    /// Whether a job is currently executing.
    pub fn is_running(&self, job_name: &str) -> bool {
        self.read().get(job_name).is_some_and(|s| s.is_running)
    }

    /// Whether a job is registered.
    pub fn is_registered(&self, job_name: &str) -> bool {
        self.read().contains_key(job_name)
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let registry = JobRegistry::new();
        registry.register("renewal_generation", "0 0 2 * * *");

        let status = registry.get_status("renewal_generation").unwrap();
        assert_eq!(status.cron_expr, "0 0 2 * * *");
        assert_eq!(status.run_count, 0);
        assert!(!status.is_running);
        assert!(registry.is_registered("renewal_generation"));
    }

    #[test]
    fn test_record_failure_counts_error() {
        let registry = JobRegistry::new();
        registry.register("job", "0 0 2 * * *");
        registry.record_start("job");
        registry.record_complete("job", JobResult::Failed("Data unavailable".into()), 40);

        let status = registry.get_status("job").unwrap();
        assert_eq!(status.run_count, 1);
        assert_eq!(status.error_count, 1);
        assert_eq!(status.last_duration_ms, Some(40));
        assert!(status.last_run.is_some());
    }

    #[test]
    fn test_skipped_is_not_an_error() {
        let registry = JobRegistry::new();
        registry.register("job", "0 0 2 * * *");
        registry.record_complete(
            "job",
            JobError::Skipped("generation in progress".into()).into(),
            0,
        );

        let status = registry.get_status("job").unwrap();
        assert_eq!(status.run_count, 1);
        assert_eq!(status.error_count, 0);
        assert_eq!(
            status.last_result,
            Some(JobResult::Skipped("generation in progress".into()))
        );
    }

    #[test]
    fn test_metadata_replaced_each_run() {
        let registry = JobRegistry::new();
        registry.register("job", "0 0 2 * * *");

        let output = JobOutput::new().with_metadata("generated_count", 4);
        registry.record_complete_with_metadata("job", JobResult::Success, 10, output.metadata);
        assert_eq!(
            registry.get_status("job").unwrap().last_run_metadata["generated_count"],
            "4"
        );

        registry.record_complete("job", JobResult::Success, 10);
        assert!(registry
            .get_status("job")
            .unwrap()
            .last_run_metadata
            .is_empty());
    }

    #[test]
    fn test_unknown_job_ignored() {
        let registry = JobRegistry::new();
        registry.record_start("unknown");
        registry.record_complete("unknown", JobResult::Success, 100);
        assert!(registry.get_status("unknown").is_none());
        assert!(!registry.is_running("unknown"));
        assert_eq!(registry.job_count(), 0);
    }

    #[test]
    fn test_all_status_sorted() {
        let registry = JobRegistry::new();
        registry.register("b", "0 0 2 * * *");
        registry.register("a", "0 0 3 * * *");
        let names: Vec<String> = registry
            .get_all_status()
            .into_iter()
            .map(|s| s.job_name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
