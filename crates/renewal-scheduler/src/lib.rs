//! Scheduled invocation of the renewal engine.
//!
//! Runs session generation unattended using `tokio-cron-scheduler`
//! with timezone support and graceful shutdown.
//!
//! # Features
//!
//! - Cron-based scheduling with 6-field cron expressions
//! - Timezone-aware scheduling via chrono-tz
//! - Graceful shutdown via CancellationToken, propagated into engine runs
//! - Job status observability via JobRegistry
//!
//! # Example
//!
//! ```ignore
//! use renewal_scheduler::{
//!     create_renewal_job, RenewalJobConfig, SchedulerConfig, SchedulerService,
//! };
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::from(&settings.schedule)).await?;
//! create_renewal_job(&scheduler, coordinator, RenewalJobConfig::from_settings(&settings)).await?;
//!
//! scheduler.start().await?;
//! let status = scheduler.registry().get_status("renewal_generation");
//! ```

mod config;
mod error;
pub mod jobs;
mod registry;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use jobs::{create_renewal_job, run_renewal, RenewalJobConfig, RENEWAL_JOB_NAME};
pub use registry::{JobError, JobOutput, JobRegistry, JobResult, JobStatus};
pub use scheduler::{run_recorded, validate_cron_expression, SchedulerService};
