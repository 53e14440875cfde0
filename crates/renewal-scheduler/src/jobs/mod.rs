//! Predefined jobs.
//!
//! - **renewal**: unattended full session generation

pub mod renewal;

pub use renewal::{create_renewal_job, run_renewal, RenewalJobConfig, RENEWAL_JOB_NAME};
