//! Session bucketizing.
//!
//! Candidates are sorted by expiry (ties broken by staff id, then record
//! id) and consumed greedily into consecutive buckets of `capacity`; the
//! last bucket may be smaller. Earliest-expiring staff land in the earliest
//! sessions.
//!
//! Each bucket is scheduled at
//! `max(now, earliest_expiry - days_before_expiry)`, so a session is never
//! placed in the past. Buckets whose members have already lapsed are
//! scheduled for `now`.
//!
//! Identical input yields identical membership and dates.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use renewal_types::{RecordSource, RosterMember, Session};

use crate::classifier::expiry_instant;
use crate::selector::CandidateEntry;
use crate::EngineError;

/// Attributes stamped on every session of one bucketizing pass.
#[derive(Debug, Clone)]
pub struct SessionTemplate {
    pub requirement_id: String,
    pub location: String,
    pub airport: Option<String>,
    pub source: Option<RecordSource>,
}

impl SessionTemplate {
    /// Template for a requirement with the given location.
    pub fn new(requirement_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            requirement_id: requirement_id.into(),
            location: location.into(),
            airport: None,
            source: None,
        }
    }

    /// Set the station code.
    pub fn with_airport(mut self, airport: Option<String>) -> Self {
        self.airport = airport;
        self
    }

    /// Set the record source.
    pub fn with_source(mut self, source: RecordSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// Sort candidates into bucketizing order.
pub fn sort_candidates(candidates: &mut [CandidateEntry]) {
    candidates.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.staff_id.cmp(&b.staff_id))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
}

/// Session date for a bucket whose most urgent member expires on `earliest_expiry`.
///
/// A lead time reaching before the representable range lands on `now`.
pub fn schedule_date(
    earliest_expiry: NaiveDate,
    days_before_expiry: u32,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    expiry_instant(earliest_expiry)
        .checked_sub_signed(Duration::days(i64::from(days_before_expiry)))
        .map_or(now, |lead| lead.max(now))
}

/// Partition one requirement's candidates into sessions.
///
/// # Errors
///
/// - `InvalidCapacity` if `capacity < 1`
/// - `InvalidInput` if a candidate belongs to another requirement
pub fn bucketize(
    mut candidates: Vec<CandidateEntry>,
    capacity: u32,
    days_before_expiry: u32,
    now: DateTime<Utc>,
    template: &SessionTemplate,
) -> Result<Vec<Session>, EngineError> {
    if capacity < 1 {
        return Err(EngineError::InvalidCapacity(capacity));
    }
    if let Some(stray) = candidates
        .iter()
        .find(|c| c.requirement_id != template.requirement_id)
    {
        return Err(EngineError::InvalidInput(format!(
            "candidate {} belongs to requirement {}, expected {}",
            stray.record_id, stray.requirement_id, template.requirement_id
        )));
    }

    sort_candidates(&mut candidates);

    let sessions = candidates
        .chunks(capacity as usize)
        .map(|bucket| {
            // Sorted, so the first member is the most urgent
            let earliest = bucket[0].expiry_date;
            let mut session = Session::auto_generated(
                template.requirement_id.clone(),
                schedule_date(earliest, days_before_expiry, now),
                capacity,
                now,
            );
            session.location = template.location.clone();
            session.airport = template.airport.clone();
            session.source = template.source;
            session.days_before_expiry = Some(days_before_expiry);
            session.roster = bucket
                .iter()
                .map(|c| RosterMember::new(c.staff_id.clone(), c.record_id.clone(), c.expiry_date))
                .collect();
            session
        })
        .collect();

    Ok(sessions)
}
