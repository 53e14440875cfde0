//! Scheduled training sessions and their rosters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordSource;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Planned, not yet started
    #[default]
    Scheduled,
    /// Currently running
    InProgress,
    /// Finished
    Completed,
    /// Called off
    Cancelled,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Who created a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Created by an operator
    #[default]
    Manual,
    /// Created by the scheduling engine
    AutoGenerated,
}

/// One booked staff member on a session roster.
///
/// Carries the expiry that put the member on the roster so a capacity
/// rebalance can re-sort without re-running candidate selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterMember {
    /// Staff member
    pub staff_id: String,

    /// Validity record being renewed
    pub record_id: String,

    /// Expiry date of that record
    pub expiry_date: NaiveDate,
}

impl RosterMember {
    /// Create a roster member.
    pub fn new(
        staff_id: impl Into<String>,
        record_id: impl Into<String>,
        expiry_date: NaiveDate,
    ) -> Self {
        Self {
            staff_id: staff_id.into(),
            record_id: record_id.into(),
            expiry_date,
        }
    }
}

/// A scheduled training occurrence.
///
/// Invariant: `roster.len() <= capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier (ULID string for generated sessions)
    pub session_id: String,

    /// Training requirement delivered in this session
    pub requirement_id: String,

    /// When the session takes place
    pub scheduled_at: DateTime<Utc>,

    /// Room or site
    pub location: String,

    /// Station code, when sessions are organised per airport
    #[serde(default)]
    pub airport: Option<String>,

    /// Maximum roster size
    pub capacity: u32,

    /// Assigned instructor, if one could be matched
    #[serde(default)]
    pub instructor_id: Option<String>,

    /// Booked members
    #[serde(default)]
    pub roster: Vec<RosterMember>,

    /// Lifecycle status
    #[serde(default)]
    pub status: SessionStatus,

    /// Manual or auto-generated
    #[serde(default)]
    pub provenance: Provenance,

    /// Record collection an auto-generated session was built from
    #[serde(default)]
    pub source: Option<RecordSource>,

    /// Lead time used to compute `scheduled_at` (auto-generated only)
    #[serde(default)]
    pub days_before_expiry: Option<u32>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty auto-generated session in `scheduled` status.
    pub fn auto_generated(
        requirement_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        capacity: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: ulid::Ulid::new().to_string(),
            requirement_id: requirement_id.into(),
            scheduled_at,
            location: String::new(),
            airport: None,
            capacity,
            instructor_id: None,
            roster: Vec::new(),
            status: SessionStatus::Scheduled,
            provenance: Provenance::AutoGenerated,
            source: None,
            days_before_expiry: None,
            created_at,
        }
    }

    /// Create a manual session with the given identifier.
    pub fn manual(
        session_id: impl Into<String>,
        requirement_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        capacity: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provenance: Provenance::Manual,
            ..Self::auto_generated(requirement_id, scheduled_at, capacity, scheduled_at)
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the roster.
    pub fn with_roster(mut self, roster: Vec<RosterMember>) -> Self {
        self.roster = roster;
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Earliest expiry date among roster members.
    pub fn earliest_expiry(&self) -> Option<NaiveDate> {
        self.roster.iter().map(|m| m.expiry_date).min()
    }

    /// Whether regeneration may delete and recreate this session.
    ///
    /// Only auto-generated sessions that have not started qualify.
    pub fn is_replaceable(&self) -> bool {
        self.provenance == Provenance::AutoGenerated && self.status == SessionStatus::Scheduled
    }

    /// Whether the session still holds its roster members.
    ///
    /// In-progress and completed sessions always do; a scheduled session
    /// only while its date lies in the future.
    pub fn holds_roster(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SessionStatus::InProgress | SessionStatus::Completed => true,
            SessionStatus::Scheduled => self.scheduled_at > now,
            SessionStatus::Cancelled => false,
        }
    }

    /// Whether the roster is within capacity.
    pub fn within_capacity(&self) -> bool {
        self.roster.len() <= self.capacity as usize
    }
}
