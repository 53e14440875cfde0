//! Collaborator contracts consumed by the engine.
//!
//! Staff directory, certification store and instructor directory are
//! external systems. The engine only depends on these traits.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, warn};

use renewal_types::{
    InstructorRef, RecordSource, Session, StaffRef, TrainingRequirement, ValidityRecord,
};

/// Error type for collaborator calls.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transient failure (connection dropped, backend busy); safe to retry
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Permanent failure; retrying will not help
    #[error("Store rejected request: {0}")]
    Rejected(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Whether the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Filter for validity record queries.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Only records from this collection
    pub source: Option<RecordSource>,

    /// Only records of these requirements (`None` = all)
    pub requirement_ids: Option<BTreeSet<String>>,
}

impl RecordFilter {
    /// Whether a record passes the filter.
    pub fn matches(&self, record: &ValidityRecord) -> bool {
        self.source.map_or(true, |s| s == record.source)
            && self
                .requirement_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&record.requirement_id))
    }
}

/// Filter for session queries.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Only sessions of these requirements (`None` = all)
    pub requirement_ids: Option<BTreeSet<String>>,
}

impl SessionFilter {
    /// Whether a session passes the filter.
    pub fn matches(&self, session: &Session) -> bool {
        self.requirement_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&session.requirement_id))
    }
}

/// Staff directory.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// All currently active staff members.
    async fn list_active_staff(&self) -> Result<Vec<StaffRef>, StoreError>;
}

/// Instructor directory.
#[async_trait]
pub trait InstructorDirectory: Send + Sync {
    /// All currently active instructors with their specializations.
    async fn list_active_instructors(&self) -> Result<Vec<InstructorRef>, StoreError>;
}

/// Certification store: requirements, validity records and sessions.
///
/// `write_sessions` upserts and links each roster member's record to its
/// session. `delete_sessions` removes sessions with their roster links and
/// clears record links pointing at them. Both must be atomic per call.
#[async_trait]
pub trait CertificationStore: Send + Sync {
    /// The training requirement catalog.
    async fn list_requirements(&self) -> Result<Vec<TrainingRequirement>, StoreError>;

    /// Validity records matching the filter.
    async fn list_validity_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<ValidityRecord>, StoreError>;

    /// Sessions matching the filter, in every status.
    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError>;

    /// Insert or replace sessions and link their roster records.
    async fn write_sessions(&self, sessions: &[Session]) -> Result<(), StoreError>;

    /// Delete sessions and unlink their records.
    async fn delete_sessions(&self, session_ids: &[String]) -> Result<(), StoreError>;

    /// Swap `old` for `new` so readers never see the scope emptied.
    ///
    /// The default stages the swap as insert-then-delete. If the delete
    /// fails the inserted sessions are removed again and `old` is rewritten
    /// to restore its record links. Stores with transactions should
    /// override this with a single atomic swap.
    async fn replace_sessions(&self, old: &[Session], new: &[Session]) -> Result<(), StoreError> {
        let new_ids: Vec<String> = new.iter().map(|s| s.session_id.clone()).collect();
        let old_ids: Vec<String> = old.iter().map(|s| s.session_id.clone()).collect();

        if !new.is_empty() {
            if let Err(e) = self.write_sessions(new).await {
                if let Err(cleanup) = self.delete_sessions(&new_ids).await {
                    warn!(error = %cleanup, "Cleanup after failed insert did not complete");
                }
                return Err(e);
            }
        }

        if old_ids.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.delete_sessions(&old_ids).await {
            warn!(error = %e, "Delete of superseded sessions failed, rolling back");
            if !new_ids.is_empty() {
                if let Err(rollback) = self.delete_sessions(&new_ids).await {
                    error!(error = %rollback, "Rollback of new sessions failed");
                }
            }
            if let Err(restore) = self.write_sessions(old).await {
                error!(error = %restore, "Restoring superseded sessions failed");
            }
            return Err(e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(req: &str, source: RecordSource) -> ValidityRecord {
        ValidityRecord::new(
            "rec-1",
            "s1",
            req,
            source,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Some(12),
        )
    }

    #[test]
    fn test_record_filter() {
        let all = RecordFilter::default();
        assert!(all.matches(&record("r1", RecordSource::Certificates)));

        let certs = RecordFilter {
            source: Some(RecordSource::Certificates),
            requirement_ids: Some(["r1".to_string()].into()),
        };
        assert!(certs.matches(&record("r1", RecordSource::Certificates)));
        assert!(!certs.matches(&record("r1", RecordSource::TrainingRecords)));
        assert!(!certs.matches(&record("r2", RecordSource::Certificates)));
    }

    #[test]
    fn test_transient() {
        assert!(StoreError::Unavailable("x".into()).is_transient());
        assert!(!StoreError::Rejected("x".into()).is_transient());
        assert!(!StoreError::NotFound("x".into()).is_transient());
    }
}
