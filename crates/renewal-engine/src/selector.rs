//! Candidate selection.
//!
//! Picks every validity record of an active staff member whose expiry falls
//! on or before `now + lookahead_days` (already-expired records included),
//! grouped by training requirement. Order within a group is left to the
//! bucketizer.
//!
//! Loading is all-or-nothing: any failed query aborts the run with
//! `DataUnavailable` rather than producing a partial candidate set.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use renewal_types::{RecordSource, Session, TrainingRequirement, ValidityRecord};

use crate::classifier::{expiry_date, expiry_instant};
use crate::lock::Scope;
use crate::retry::RetryPolicy;
use crate::source::{CertificationStore, RecordFilter, SessionFilter, StaffDirectory};
use crate::EngineError;

/// One record due for renewal. Exists only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub record_id: String,
    pub staff_id: String,
    pub requirement_id: String,
    pub expiry_date: NaiveDate,
}

impl CandidateEntry {
    /// Create a candidate entry.
    pub fn new(
        record_id: impl Into<String>,
        staff_id: impl Into<String>,
        requirement_id: impl Into<String>,
        expiry_date: NaiveDate,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            staff_id: staff_id.into(),
            requirement_id: requirement_id.into(),
            expiry_date,
        }
    }
}

/// Parameters of one selection pass.
#[derive(Debug, Clone)]
pub struct SelectionParams {
    pub source: RecordSource,
    pub lookahead_days: u32,
    pub scope: Scope,
}

/// Point-in-time view of everything selection needs.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub active_staff: HashSet<String>,
    pub requirements: HashMap<String, TrainingRequirement>,
    pub records: Vec<ValidityRecord>,
    /// Sessions of the scope, any status
    pub sessions: Vec<Session>,
}

impl Snapshot {
    /// Load a snapshot for the given scope and source.
    ///
    /// Each query is retried on transient failure; any remaining failure
    /// fails the whole load.
    pub async fn load(
        staff: &dyn StaffDirectory,
        store: &dyn CertificationStore,
        params: &SelectionParams,
        retry: &RetryPolicy,
    ) -> Result<Self, EngineError> {
        let record_filter = RecordFilter {
            source: Some(params.source),
            requirement_ids: params.scope.requirement_ids(),
        };
        let session_filter = SessionFilter {
            requirement_ids: params.scope.requirement_ids(),
        };

        let active_staff = retry
            .run("list active staff", || staff.list_active_staff())
            .await
            .map_err(|e| EngineError::unavailable("list active staff", e))?
            .into_iter()
            .filter(|s| s.active)
            .map(|s| s.staff_id)
            .collect();

        let requirements = retry
            .run("list requirements", || store.list_requirements())
            .await
            .map_err(|e| EngineError::unavailable("list requirements", e))?
            .into_iter()
            .map(|r| (r.requirement_id.clone(), r))
            .collect();

        let records = retry
            .run("list validity records", || {
                store.list_validity_records(&record_filter)
            })
            .await
            .map_err(|e| EngineError::unavailable("list validity records", e))?;

        let sessions = retry
            .run("list sessions", || store.list_sessions(&session_filter))
            .await
            .map_err(|e| EngineError::unavailable("list sessions", e))?;

        Ok(Self {
            active_staff,
            requirements,
            records,
            sessions,
        })
    }
}

/// Select candidates from a snapshot.
///
/// `released` holds ids of sessions about to be replaced; links to them do
/// not exclude a record.
///
/// A record is skipped when:
/// - its holder is not an active staff member
/// - it has no expiry, or expires after `now + lookahead_days`
/// - a newer record of the same staff member and requirement supersedes it
/// - it is linked to a session that still holds its roster
pub fn select_candidates(
    snapshot: &Snapshot,
    params: &SelectionParams,
    now: DateTime<Utc>,
    released: &HashSet<String>,
) -> BTreeMap<String, Vec<CandidateEntry>> {
    // None when the window runs past the representable range: no upper bound
    let horizon = now.checked_add_signed(Duration::days(i64::from(params.lookahead_days)));
    let sessions: HashMap<&str, &Session> = snapshot
        .sessions
        .iter()
        .map(|s| (s.session_id.as_str(), s))
        .collect();

    // Latest-expiring record per (staff, requirement)
    let mut current: HashMap<(&str, &str), (&ValidityRecord, NaiveDate)> = HashMap::new();
    for record in &snapshot.records {
        if record.source != params.source || !params.scope.contains(&record.requirement_id) {
            continue;
        }
        if !snapshot.active_staff.contains(&record.staff_id) {
            continue;
        }
        let Some(expiry) = expiry_date(record.issue_date, record.validity_months) else {
            continue;
        };
        let key = (record.staff_id.as_str(), record.requirement_id.as_str());
        let newer = current.get(&key).map_or(true, |(existing, existing_expiry)| {
            (expiry, record.record_id.as_str()) > (*existing_expiry, existing.record_id.as_str())
        });
        if newer {
            current.insert(key, (record, expiry));
        }
    }

    let mut groups: BTreeMap<String, Vec<CandidateEntry>> = BTreeMap::new();
    let mut booked = 0usize;
    for (record, expiry) in current.into_values() {
        if horizon.is_some_and(|horizon| expiry_instant(expiry) > horizon) {
            continue;
        }
        let is_booked = record
            .linked_session_id
            .as_deref()
            .filter(|id| !released.contains(*id))
            .and_then(|id| sessions.get(id))
            .is_some_and(|s| s.holds_roster(now));
        if is_booked {
            booked += 1;
            continue;
        }
        groups
            .entry(record.requirement_id.clone())
            .or_default()
            .push(CandidateEntry::new(
                record.record_id.clone(),
                record.staff_id.clone(),
                record.requirement_id.clone(),
                expiry,
            ));
    }

    debug!(
        requirements = groups.len(),
        candidates = groups.values().map(Vec::len).sum::<usize>(),
        already_booked = booked,
        "Candidate selection complete"
    );
    groups
}
