//! End-to-end test infrastructure for the renewal engine.
//!
//! Provides a shared TestHarness over a temporary RocksDB store and
//! fixture builders for staff, records and sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Months, NaiveDate, TimeZone, Utc};

use renewal_engine::{
    GenerateRequest, GenerationSummary, RebalanceRequest, RegenerationCoordinator, RetryPolicy,
    RunControl, Scope,
};
use renewal_storage::{Dataset, Storage};
use renewal_types::{
    InstructorRef, RecordSource, RosterMember, Session, StaffRef, TrainingRequirement,
    ValidityRecord,
};

/// Fixed evaluation instant shared by all scenarios.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
}

/// Calendar date `days` after [`fixed_now`].
pub fn day(days: i64) -> NaiveDate {
    fixed_now().date_naive() + ChronoDuration::days(days)
}

/// Instant `days` after [`fixed_now`].
pub fn at(days: i64) -> DateTime<Utc> {
    fixed_now() + ChronoDuration::days(days)
}

/// A 12-month certificate that expires `days` after [`fixed_now`].
pub fn expiring_record(
    record_id: &str,
    staff_id: &str,
    requirement_id: &str,
    days: i64,
) -> ValidityRecord {
    let expiry = day(days);
    let issued = expiry
        .checked_sub_months(Months::new(12))
        .expect("issue date in range");
    assert_eq!(
        issued.checked_add_months(Months::new(12)),
        Some(expiry),
        "fixture expiry must survive month arithmetic"
    );
    ValidityRecord::new(
        record_id,
        staff_id,
        requirement_id,
        RecordSource::Certificates,
        issued,
        Some(12),
    )
}

/// Requirement catalog used by every scenario.
pub fn catalog() -> Vec<TrainingRequirement> {
    vec![
        TrainingRequirement::new("fa", "FA", "First Aid", Some(12), "safety").mandatory(),
        TrainingRequirement::new("dg", "DG", "Dangerous Goods", Some(24), "cargo"),
        TrainingRequirement::new("ind", "IND", "Induction", None, "general"),
    ]
}

/// Instructors: two for safety, one for cargo.
pub fn instructors() -> Vec<InstructorRef> {
    vec![
        InstructorRef::new("i-ann", "Ann", ["safety"]),
        InstructorRef::new("i-bob", "Bob", ["safety", "cargo"]),
        InstructorRef::new("i-cy", "Cy", ["cargo"]).inactive(),
    ]
}

/// Staff ids `{prefix}-00`, `{prefix}-01`, ...
pub fn staff_ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}-{i:02}")).collect()
}

/// A scheduled auto-generated session holding the given records.
pub fn booked_session(
    requirement_id: &str,
    records: &[ValidityRecord],
    scheduled_in_days: i64,
    capacity: u32,
) -> Session {
    let roster = records
        .iter()
        .map(|r| {
            let expiry = r
                .issue_date
                .checked_add_months(Months::new(r.validity_months.unwrap_or(0)))
                .expect("expiry in range");
            RosterMember::new(r.staff_id.clone(), r.record_id.clone(), expiry)
        })
        .collect();
    let mut session =
        Session::auto_generated(requirement_id, at(scheduled_in_days), capacity, fixed_now())
            .with_roster(roster)
            .with_location("Hangar 2");
    session.source = Some(RecordSource::Certificates);
    session.days_before_expiry = Some(30);
    session
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared storage instance
    pub storage: Arc<Storage>,
    /// Coordinator wired to the storage for all three collaborator roles
    pub coordinator: RegenerationCoordinator,
}

impl TestHarness {
    /// Create a harness with the standard catalog and instructors loaded.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));

        storage
            .import(&Dataset {
                requirements: catalog(),
                instructors: instructors(),
                ..Default::default()
            })
            .expect("Failed to seed catalog");

        let coordinator =
            RegenerationCoordinator::new(storage.clone(), storage.clone(), storage.clone())
                .with_retry(RetryPolicy::no_retry());

        Self {
            _temp_dir: temp_dir,
            storage,
            coordinator,
        }
    }

    /// Add active staff members.
    pub fn add_staff(&self, ids: &[String]) {
        for id in ids {
            self.storage
                .put_staff(&StaffRef::new(id.clone(), format!("Staff {id}")))
                .expect("Failed to put staff");
        }
    }

    /// Add validity records.
    pub fn add_records(&self, records: &[ValidityRecord]) {
        for record in records {
            self.storage.put_record(record).expect("Failed to put record");
        }
    }

    /// Store sessions as they would exist after an earlier run.
    pub fn add_sessions(&self, sessions: &[Session]) {
        self.storage
            .swap_sessions(&[], sessions)
            .expect("Failed to store sessions");
    }

    /// Full generation at [`fixed_now`] with the given capacity.
    pub async fn generate(&self, capacity: u32) -> GenerationSummary {
        self.generate_with(request(capacity)).await
    }

    /// Full generation at [`fixed_now`].
    pub async fn generate_with(&self, request: GenerateRequest) -> GenerationSummary {
        self.coordinator
            .generate(request, fixed_now(), control())
            .await
            .expect("generation failed")
    }

    /// Capacity rebalance at [`fixed_now`].
    pub async fn rebalance(&self, capacity: u32) -> GenerationSummary {
        self.coordinator
            .regenerate_with_capacity(RebalanceRequest::new(capacity, 30), fixed_now(), control())
            .await
            .expect("rebalance failed")
    }

    /// Every stored session.
    pub fn sessions(&self) -> Vec<Session> {
        self.storage.list_sessions().expect("Failed to list sessions")
    }

    /// Replaceable sessions as (date, sorted staff ids), ordered by date.
    pub fn layout(&self) -> Vec<(DateTime<Utc>, Vec<String>)> {
        let mut layout: Vec<(DateTime<Utc>, Vec<String>)> = self
            .sessions()
            .into_iter()
            .filter(Session::is_replaceable)
            .map(|s| {
                let mut ids: Vec<String> = s.roster.iter().map(|m| m.staff_id.clone()).collect();
                ids.sort();
                (s.scheduled_at, ids)
            })
            .collect();
        layout.sort();
        layout
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Generation request with the standard policy: 30 days lead, 90 days lookahead.
pub fn request(capacity: u32) -> GenerateRequest {
    GenerateRequest {
        source: RecordSource::Certificates,
        days_before_expiry: 30,
        lookahead_days: 90,
        capacity,
        location: "Training Room".to_string(),
        airport: Some("LHR".to_string()),
        scope: Scope::All,
    }
}

/// Generous run bounds for tests.
pub fn control() -> RunControl {
    RunControl::new(Duration::from_secs(30))
}
