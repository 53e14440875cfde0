//! Validity records: a staff member's holding of a certification.
//!
//! The expiry status of a record is never stored. It is derived from the
//! expiry date and the evaluation instant every time it is needed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::RenewalError;

/// Which collection a validity record comes from.
///
/// Certificates and training records reduce to the same candidate shape;
/// a generation run selects from exactly one of them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Issued certificates
    #[default]
    Certificates,
    /// Completed training records
    TrainingRecords,
}

impl std::fmt::Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordSource::Certificates => write!(f, "certificates"),
            RecordSource::TrainingRecords => write!(f, "training_records"),
        }
    }
}

impl std::str::FromStr for RecordSource {
    type Err = RenewalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "certificates" | "certificate" => Ok(RecordSource::Certificates),
            "training_records" | "trainingrecords" | "training" => {
                Ok(RecordSource::TrainingRecords)
            }
            other => Err(RenewalError::InvalidInput(format!(
                "unknown source type '{other}' (expected certificates or training-records)"
            ))),
        }
    }
}

/// Lifecycle classification of a validity record relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryStatus {
    /// More than 30 days remaining
    Valid,
    /// 8 to 30 days remaining
    ExpiringSoon,
    /// 0 to 7 days remaining
    Critical,
    /// Past the expiry date
    Expired,
    /// The requirement has no validity period
    NoExpiry,
}

impl ExpiryStatus {
    /// Whether the record needs a renewal session soon (or already lapsed).
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            ExpiryStatus::ExpiringSoon | ExpiryStatus::Critical | ExpiryStatus::Expired
        )
    }
}

impl std::fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryStatus::Valid => write!(f, "valid"),
            ExpiryStatus::ExpiringSoon => write!(f, "expiring-soon"),
            ExpiryStatus::Critical => write!(f, "critical"),
            ExpiryStatus::Expired => write!(f, "expired"),
            ExpiryStatus::NoExpiry => write!(f, "no-expiry"),
        }
    }
}

/// One certification or training instance held by one staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityRecord {
    /// Unique identifier
    pub record_id: String,

    /// Holder of the record
    pub staff_id: String,

    /// Training requirement this record satisfies
    pub requirement_id: String,

    /// Collection the record belongs to
    #[serde(default)]
    pub source: RecordSource,

    /// Date the certification was issued (or training completed)
    pub issue_date: NaiveDate,

    /// Validity period copied from the requirement at issue time.
    /// `None` or zero means no expiry.
    #[serde(default)]
    pub validity_months: Option<u32>,

    /// Session this record is currently booked on, if any
    #[serde(default)]
    pub linked_session_id: Option<String>,
}

impl ValidityRecord {
    /// Create an unlinked record.
    pub fn new(
        record_id: impl Into<String>,
        staff_id: impl Into<String>,
        requirement_id: impl Into<String>,
        source: RecordSource,
        issue_date: NaiveDate,
        validity_months: Option<u32>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            staff_id: staff_id.into(),
            requirement_id: requirement_id.into(),
            source,
            issue_date,
            validity_months,
            linked_session_id: None,
        }
    }

    /// Link the record to a session.
    pub fn with_linked_session(mut self, session_id: impl Into<String>) -> Self {
        self.linked_session_id = Some(session_id.into());
        self
    }

    /// Record a renewal: new issue date, link cleared.
    pub fn renew(&mut self, issue_date: NaiveDate) {
        self.issue_date = issue_date;
        self.linked_session_id = None;
    }
}
