//! End-to-end tests for repeated generation runs.
//!
//! Covers idempotent regeneration, preservation of sessions that must not
//! be touched, and the failure paths that leave storage unchanged.

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use e2e_tests::{
    at, booked_session, control, expiring_record, fixed_now, request, staff_ids, TestHarness,
};
use renewal_engine::{EngineError, RunState, Scope};
use renewal_types::{Session, SessionStatus, ValidityRecord};

fn seeded(count: usize) -> (TestHarness, Vec<ValidityRecord>) {
    let harness = TestHarness::new();
    harness.add_staff(&staff_ids("s", count));
    let records: Vec<ValidityRecord> = (0..count)
        .map(|i| {
            expiring_record(
                &format!("fa-{i}"),
                &format!("s-{i:02}"),
                "fa",
                10 + 7 * i as i64,
            )
        })
        .collect();
    harness.add_records(&records);
    (harness, records)
}

/// A second run over unchanged data reproduces the same layout.
#[tokio::test]
async fn test_regeneration_is_idempotent() {
    let (harness, _) = seeded(6);

    let first = harness.generate(4).await;
    let layout = harness.layout();
    let second = harness.generate(4).await;

    assert_eq!(harness.layout(), layout);
    assert_eq!(second.generated_count, first.generated_count);
    assert_eq!(second.assigned_count, first.assigned_count);
    assert_eq!(second.deleted_count, first.generated_count);
    assert_eq!(harness.sessions().len(), first.generated_count);
}

/// A newly expiring record joins the earliest session on the next run.
#[tokio::test]
async fn test_regeneration_absorbs_new_candidates() {
    let (harness, _) = seeded(3);
    harness.generate(2).await;
    assert_eq!(harness.layout()[0].1, vec!["s-00".to_string(), "s-01".to_string()]);

    harness.add_staff(&["late".to_string()]);
    harness.add_records(&[expiring_record("fa-late", "late", "fa", 1)]);
    let summary = harness.generate(2).await;

    assert_eq!(summary.assigned_count, 4);
    assert_eq!(
        harness.layout(),
        vec![
            (fixed_now(), vec!["late".to_string(), "s-00".to_string()]),
            (fixed_now(), vec!["s-01".to_string(), "s-02".to_string()]),
        ]
    );
}

/// Renewed certificates drop out of the next run.
#[tokio::test]
async fn test_regeneration_drops_renewed_staff() {
    let (harness, mut records) = seeded(3);
    harness.generate(5).await;

    records[0].renew(fixed_now().date_naive());
    harness.add_records(&records[..1]);
    let summary = harness.generate(5).await;

    assert_eq!(summary.assigned_count, 2);
    assert_eq!(
        harness.layout(),
        vec![(fixed_now(), vec!["s-01".to_string(), "s-02".to_string()])]
    );
    assert_eq!(
        harness.storage.get_record("fa-0").unwrap().unwrap().linked_session_id,
        None
    );
}

/// In-progress and manual sessions survive and keep their members.
#[tokio::test]
async fn test_regeneration_preserves_started_and_manual_sessions() {
    let (harness, records) = seeded(4);

    let started = booked_session("fa", &records[..1], -1, 5).with_status(SessionStatus::InProgress);
    let mut manual = Session::manual("manual-1", "fa", at(3), 5);
    manual.roster = booked_session("fa", &records[1..2], 3, 5).roster;

    harness.add_sessions(&[started.clone(), manual.clone()]);
    let summary = harness.generate(5).await;

    assert_eq!(summary.preserved_count, 2);
    assert_eq!(summary.assigned_count, 2);
    assert_eq!(
        harness.storage.get_session(&started.session_id).unwrap(),
        Some(started)
    );
    assert_eq!(harness.storage.get_session("manual-1").unwrap(), Some(manual));
    assert_eq!(
        harness.layout(),
        vec![(fixed_now(), vec!["s-02".to_string(), "s-03".to_string()])]
    );
}

/// A cancelled session no longer holds its members.
#[tokio::test]
async fn test_regeneration_reselects_members_of_cancelled_session() {
    let (harness, records) = seeded(2);
    let cancelled = booked_session("fa", &records, 5, 5).with_status(SessionStatus::Cancelled);
    harness.add_sessions(&[cancelled.clone()]);

    let summary = harness.generate(5).await;

    assert_eq!(summary.assigned_count, 2);
    assert_eq!(
        harness.storage.get_session(&cancelled.session_id).unwrap(),
        Some(cancelled)
    );
    for record in ["fa-0", "fa-1"] {
        let linked = harness
            .storage
            .get_record(record)
            .unwrap()
            .unwrap()
            .linked_session_id;
        assert!(linked.is_some());
    }
}

/// A run scoped to one requirement leaves other requirements' sessions alone.
#[tokio::test]
async fn test_scoped_regeneration() {
    let (harness, _) = seeded(2);
    harness.add_records(&[expiring_record("dg-0", "s-00", "dg", 20)]);
    harness.generate(5).await;
    let fa_before: Vec<Session> = harness
        .sessions()
        .into_iter()
        .filter(|s| s.requirement_id == "fa")
        .collect();

    let summary = harness
        .generate_with(request(5).with_scope(Scope::requirements(["dg"])))
        .await;

    assert_eq!(summary.generated_count, 1);
    assert_eq!(summary.deleted_count, 1);
    let fa_after: Vec<Session> = harness
        .sessions()
        .into_iter()
        .filter(|s| s.requirement_id == "fa")
        .collect();
    assert_eq!(fa_after, fa_before);
}

/// A held lock rejects an overlapping run and storage stays as it was.
#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let (harness, _) = seeded(3);
    harness.generate(2).await;
    let before = harness.sessions();

    let guard = harness
        .coordinator
        .locks()
        .try_acquire(&Scope::requirements(["fa"]))
        .unwrap();
    let result = harness
        .coordinator
        .generate(request(1), fixed_now(), control())
        .await;

    assert!(matches!(result, Err(EngineError::LockContention(_))));
    assert_eq!(harness.sessions(), before);

    drop(guard);
    let summary = harness.generate(1).await;
    assert_eq!(summary.generated_count, 3);
}

/// A run cancelled before it starts commits nothing.
#[tokio::test]
async fn test_cancelled_run_commits_nothing() {
    let (harness, _) = seeded(3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = harness
        .coordinator
        .generate(request(2), fixed_now(), control().with_cancel(cancel))
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Cancelled {
            phase: RunState::Selecting
        })
    ));
    assert!(harness.sessions().is_empty());
    assert!(harness.coordinator.locks().is_idle());
}

/// Zero capacity is rejected without touching storage.
#[tokio::test]
async fn test_zero_capacity_rejected() {
    let (harness, _) = seeded(2);
    harness.generate(2).await;
    let before = harness.sessions();

    let result = harness
        .coordinator
        .generate(request(0), fixed_now(), control())
        .await;

    assert!(matches!(result, Err(EngineError::InvalidCapacity(0))));
    assert_eq!(harness.sessions(), before);
}
