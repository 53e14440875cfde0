//! Error types for the renewal engine.
//!
//! Every failure of a generation run surfaces as one of these variants;
//! nothing is thrown past the pipeline boundary. A missing instructor is
//! the only gap that is not an error.

use thiserror::Error;

use crate::source::StoreError;
use crate::RunState;

/// Errors returned by the scheduling pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Selection or storage query failed; the run was aborted with no commit
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Capacity below 1, rejected before any work
    #[error("Invalid capacity: {0} (must be at least 1)")]
    InvalidCapacity(u32),

    /// Malformed request or bucketizer input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another run holds the lock for an overlapping scope
    #[error("Generation already in progress for scope {0}")]
    LockContention(String),

    /// Write-back failed; the previous session set is intact
    #[error("Commit failed: {0}")]
    CommitFailure(String),

    /// The caller's deadline passed before commit began
    #[error("Run timed out while {phase}")]
    Timeout { phase: RunState },

    /// Cancellation was observed before commit began
    #[error("Run cancelled while {phase}")]
    Cancelled { phase: RunState },
}

impl EngineError {
    /// Map a storage read failure.
    pub(crate) fn unavailable(what: &str, err: StoreError) -> Self {
        EngineError::DataUnavailable(format!("{what}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::InvalidCapacity(0);
        assert!(err.to_string().contains("Invalid capacity"));

        let err = EngineError::LockContention("requirements[r1]".to_string());
        assert!(err.to_string().contains("already in progress"));

        let err = EngineError::Timeout {
            phase: RunState::Selecting,
        };
        assert_eq!(err.to_string(), "Run timed out while selecting");

        let err = EngineError::unavailable(
            "list validity records",
            StoreError::Unavailable("connection reset".to_string()),
        );
        assert!(err.to_string().contains("connection reset"));
    }
}
