//! # renewal-types
//!
//! Shared domain types for the certification renewal engine.
//!
//! This crate defines the core data structures used throughout the system:
//! - Training requirements: catalog entries with a validity period
//! - Validity records: one staff member's holding of a certification
//! - Sessions: scheduled training occurrences with a capacity-bounded roster
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use renewal_types::{ExpiryStatus, RecordSource};
//!
//! let source: RecordSource = "training-records".parse().unwrap();
//! assert_eq!(source, RecordSource::TrainingRecords);
//! assert!(ExpiryStatus::Critical.needs_attention());
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod requirement;
pub mod session;
pub mod staff;

pub use config::{EngineSettings, RetrySettings, ScheduleSettings, Settings};
pub use error::RenewalError;
pub use record::{ExpiryStatus, RecordSource, ValidityRecord};
pub use requirement::TrainingRequirement;
pub use session::{Provenance, RosterMember, Session, SessionStatus};
pub use staff::{InstructorRef, StaffRef};
