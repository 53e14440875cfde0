//! Renewal scheduling engine.
//!
//! Given staff whose certifications expire within a lookahead window, the
//! engine partitions them into capacity-bounded training sessions, picks
//! session dates that respect a lead-time policy, and regenerates
//! idempotently when the candidate pool or the capacity policy changes.
//!
//! # Pipeline
//!
//! - **classifier**: expiry date and status from issue date + validity period
//! - **selector**: expiring records of active staff, grouped by requirement
//! - **bucketizer**: earliest-expiry-first greedy partition into sessions
//! - **assigner**: least-loaded qualified instructor per session
//! - **coordinator**: locking, timeouts, cancellation and the staged commit
//!
//! # Example
//!
//! ```ignore
//! use renewal_engine::{GenerateRequest, RegenerationCoordinator, RunControl};
//!
//! let coordinator = RegenerationCoordinator::new(staff, store, instructors);
//! let request = GenerateRequest::from_settings(&settings.engine);
//! let summary = coordinator
//!     .generate(request, Utc::now(), RunControl::default())
//!     .await?;
//! println!("{} sessions, {} members", summary.generated_count, summary.assigned_count);
//! ```

pub mod assigner;
pub mod bucketizer;
pub mod classifier;
pub mod coordinator;
mod error;
pub mod lock;
pub mod memory;
pub mod retry;
pub mod selector;
pub mod source;
mod state;

pub use assigner::InstructorAssigner;
pub use bucketizer::{bucketize, SessionTemplate};
pub use classifier::{classify, Classification};
pub use coordinator::{
    GenerateRequest, GenerationSummary, RebalanceRequest, RegenerationCoordinator, RunControl,
};
pub use error::EngineError;
pub use lock::{Scope, ScopeGuard, ScopeLocks};
pub use memory::InMemoryStore;
pub use retry::RetryPolicy;
pub use selector::{select_candidates, CandidateEntry, SelectionParams, Snapshot};
pub use source::{
    CertificationStore, InstructorDirectory, RecordFilter, SessionFilter, StaffDirectory,
    StoreError,
};
pub use state::RunState;
