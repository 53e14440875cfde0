//! In-memory collaborator for tests and embedding.
//!
//! Implements the staff directory, certification store and instructor
//! directory over plain collections, with an atomic `replace_sessions`
//! and switches for injecting failures and latency.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use renewal_types::{
    InstructorRef, Session, SessionStatus, StaffRef, TrainingRequirement, ValidityRecord,
};

use crate::source::{
    CertificationStore, InstructorDirectory, RecordFilter, SessionFilter, StaffDirectory,
    StoreError,
};

#[derive(Debug, Default)]
struct Inner {
    staff: BTreeMap<String, StaffRef>,
    instructors: BTreeMap<String, InstructorRef>,
    requirements: BTreeMap<String, TrainingRequirement>,
    records: BTreeMap<String, ValidityRecord>,
    sessions: BTreeMap<String, Session>,
}

impl Inner {
    fn check_sessions(&self, sessions: &[Session]) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for session in sessions {
            if !session.within_capacity() {
                return Err(StoreError::Rejected(format!(
                    "session {} roster {} exceeds capacity {}",
                    session.session_id,
                    session.roster.len(),
                    session.capacity
                )));
            }
            if !seen.insert(session.session_id.as_str()) {
                return Err(StoreError::Rejected(format!(
                    "duplicate session id {}",
                    session.session_id
                )));
            }
        }
        Ok(())
    }

    fn upsert(&mut self, sessions: &[Session]) {
        for session in sessions {
            for member in &session.roster {
                if let Some(record) = self.records.get_mut(&member.record_id) {
                    record.linked_session_id = Some(session.session_id.clone());
                }
            }
            self.sessions
                .insert(session.session_id.clone(), session.clone());
        }
    }

    fn remove(&mut self, session_ids: &[String]) {
        let ids: HashSet<&str> = session_ids.iter().map(String::as_str).collect();
        for record in self.records.values_mut() {
            if record
                .linked_session_id
                .as_deref()
                .is_some_and(|id| ids.contains(id))
            {
                record.linked_session_id = None;
            }
        }
        self.sessions.retain(|id, _| !ids.contains(id.as_str()));
    }
}

/// In-memory implementation of every collaborator trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    fail_reads: AtomicU32,
    fail_writes: AtomicU32,
    fail_deletes: AtomicU32,
    fail_commits: AtomicU32,
    reject_commits: AtomicBool,
    read_delay_ms: AtomicU32,
    commit_delay_ms: AtomicU32,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add staff members.
    pub fn with_staff(self, staff: impl IntoIterator<Item = StaffRef>) -> Self {
        {
            let mut inner = self.write();
            for s in staff {
                inner.staff.insert(s.staff_id.clone(), s);
            }
        }
        self
    }

    /// Add instructors.
    pub fn with_instructors(self, instructors: impl IntoIterator<Item = InstructorRef>) -> Self {
        {
            let mut inner = self.write();
            for i in instructors {
                inner.instructors.insert(i.instructor_id.clone(), i);
            }
        }
        self
    }

    /// Add catalog entries.
    pub fn with_requirements(
        self,
        requirements: impl IntoIterator<Item = TrainingRequirement>,
    ) -> Self {
        {
            let mut inner = self.write();
            for r in requirements {
                inner.requirements.insert(r.requirement_id.clone(), r);
            }
        }
        self
    }

    /// Add validity records.
    pub fn with_records(self, records: impl IntoIterator<Item = ValidityRecord>) -> Self {
        {
            let mut inner = self.write();
            for r in records {
                inner.records.insert(r.record_id.clone(), r);
            }
        }
        self
    }

    /// Add sessions, linking their roster records.
    pub fn with_sessions(self, sessions: impl IntoIterator<Item = Session>) -> Self {
        let sessions: Vec<Session> = sessions.into_iter().collect();
        self.write().upsert(&sessions);
        self
    }

    /// All stored sessions ordered by id.
    pub fn sessions(&self) -> Vec<Session> {
        self.read().sessions.values().cloned().collect()
    }

    /// One stored session.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.read().sessions.get(session_id).cloned()
    }

    /// All stored records ordered by id.
    pub fn records(&self) -> Vec<ValidityRecord> {
        self.read().records.values().cloned().collect()
    }

    /// One stored record.
    pub fn record(&self, record_id: &str) -> Option<ValidityRecord> {
        self.read().records.get(record_id).cloned()
    }

    /// Change the status of a stored session.
    pub fn set_session_status(&self, session_id: &str, status: SessionStatus) {
        if let Some(session) = self.write().sessions.get_mut(session_id) {
            session.status = status;
        }
    }

    /// Replace or add a validity record.
    pub fn put_record(&self, record: ValidityRecord) {
        self.write().records.insert(record.record_id.clone(), record);
    }

    /// Make the next `n` read calls fail with `Unavailable`.
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` `write_sessions` calls fail with `Unavailable`.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` `delete_sessions` calls fail with `Unavailable`.
    pub fn fail_next_deletes(&self, n: u32) {
        self.fail_deletes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` `replace_sessions` calls fail with `Unavailable`.
    pub fn fail_next_commits(&self, n: u32) {
        self.fail_commits.store(n, Ordering::SeqCst);
    }

    /// Permanently reject every `replace_sessions` call.
    pub fn reject_commits(&self, reject: bool) {
        self.reject_commits.store(reject, Ordering::SeqCst);
    }

    /// Delay every read call.
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms.store(millis(delay), Ordering::SeqCst);
    }

    /// Delay every `replace_sessions` call before it applies the swap.
    pub fn set_commit_delay(&self, delay: Duration) {
        self.commit_delay_ms.store(millis(delay), Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn before_read(&self, what: &str) -> Result<(), StoreError> {
        pause(&self.read_delay_ms).await;
        take_failure(&self.fail_reads, what)
    }
}

fn millis(delay: Duration) -> u32 {
    u32::try_from(delay.as_millis()).unwrap_or(u32::MAX)
}

async fn pause(delay_ms: &AtomicU32) {
    let delay = delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
    }
}

fn take_failure(counter: &AtomicU32, what: &str) -> Result<(), StoreError> {
    let consumed = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if consumed {
        Err(StoreError::Unavailable(format!("{what}: injected failure")))
    } else {
        Ok(())
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStore {
    async fn list_active_staff(&self) -> Result<Vec<StaffRef>, StoreError> {
        self.before_read("list_active_staff").await?;
        Ok(self.read().staff.values().filter(|s| s.active).cloned().collect())
    }
}

#[async_trait]
impl InstructorDirectory for InMemoryStore {
    async fn list_active_instructors(&self) -> Result<Vec<InstructorRef>, StoreError> {
        self.before_read("list_active_instructors").await?;
        Ok(self
            .read()
            .instructors
            .values()
            .filter(|i| i.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CertificationStore for InMemoryStore {
    async fn list_requirements(&self) -> Result<Vec<TrainingRequirement>, StoreError> {
        self.before_read("list_requirements").await?;
        Ok(self.read().requirements.values().cloned().collect())
    }

    async fn list_validity_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<ValidityRecord>, StoreError> {
        self.before_read("list_validity_records").await?;
        Ok(self
            .read()
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        self.before_read("list_sessions").await?;
        Ok(self
            .read()
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn write_sessions(&self, sessions: &[Session]) -> Result<(), StoreError> {
        take_failure(&self.fail_writes, "write_sessions")?;
        let mut inner = self.write();
        inner.check_sessions(sessions)?;
        inner.upsert(sessions);
        Ok(())
    }

    async fn delete_sessions(&self, session_ids: &[String]) -> Result<(), StoreError> {
        take_failure(&self.fail_deletes, "delete_sessions")?;
        self.write().remove(session_ids);
        Ok(())
    }

    async fn replace_sessions(&self, old: &[Session], new: &[Session]) -> Result<(), StoreError> {
        if self.reject_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("commits disabled".to_string()));
        }
        take_failure(&self.fail_commits, "replace_sessions")?;
        pause(&self.commit_delay_ms).await;

        let mut inner = self.write();
        inner.check_sessions(new)?;
        let old_ids: Vec<String> = old.iter().map(|s| s.session_id.clone()).collect();
        inner.remove(&old_ids);
        inner.upsert(new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use renewal_types::{RecordSource, RosterMember};

    fn record(id: &str, staff: &str) -> ValidityRecord {
        ValidityRecord::new(
            id,
            staff,
            "r1",
            RecordSource::Certificates,
            NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            Some(12),
        )
    }

    fn session_with(ids: &[(&str, &str)]) -> Session {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();
        let expiry = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        Session::auto_generated("r1", at, 5, at).with_roster(
            ids.iter()
                .map(|(staff, rec)| RosterMember::new(*staff, *rec, expiry))
                .collect(),
        )
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_staff([StaffRef::new("s1", "A"), StaffRef::new("s2", "B").inactive()])
            .with_records([record("rec-1", "s1"), record("rec-2", "s2")])
    }

    /// Forwards everything except `replace_sessions`, exercising the
    /// trait's staged insert-then-delete swap.
    struct Staged<'a>(&'a InMemoryStore);

    #[async_trait]
    impl CertificationStore for Staged<'_> {
        async fn list_requirements(&self) -> Result<Vec<TrainingRequirement>, StoreError> {
            self.0.list_requirements().await
        }

        async fn list_validity_records(
            &self,
            filter: &RecordFilter,
        ) -> Result<Vec<ValidityRecord>, StoreError> {
            self.0.list_validity_records(filter).await
        }

        async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
            self.0.list_sessions(filter).await
        }

        async fn write_sessions(&self, sessions: &[Session]) -> Result<(), StoreError> {
            self.0.write_sessions(sessions).await
        }

        async fn delete_sessions(&self, session_ids: &[String]) -> Result<(), StoreError> {
            self.0.delete_sessions(session_ids).await
        }
    }

    #[tokio::test]
    async fn test_active_staff_only() {
        let staff = store().list_active_staff().await.unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].staff_id, "s1");
    }

    #[tokio::test]
    async fn test_write_links_and_delete_unlinks() {
        let store = store();
        let session = session_with(&[("s1", "rec-1")]);
        store.write_sessions(&[session.clone()]).await.unwrap();
        assert_eq!(
            store.record("rec-1").unwrap().linked_session_id,
            Some(session.session_id.clone())
        );

        store
            .delete_sessions(&[session.session_id.clone()])
            .await
            .unwrap();
        assert!(store.record("rec-1").unwrap().linked_session_id.is_none());
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_over_capacity_rejected() {
        let store = store();
        let mut session = session_with(&[("s1", "rec-1"), ("s2", "rec-2")]);
        session.capacity = 1;
        let result = store.write_sessions(&[session]).await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_injected_read_failures() {
        let store = store();
        store.fail_next_reads(2);
        assert!(store.list_requirements().await.is_err());
        assert!(store.list_active_staff().await.is_err());
        assert!(store.list_requirements().await.is_ok());
    }

    #[tokio::test]
    async fn test_atomic_replace_relinks() {
        let old = session_with(&[("s1", "rec-1")]);
        let store = store().with_sessions([old.clone()]);
        let new = session_with(&[("s1", "rec-1"), ("s2", "rec-2")]);

        store
            .replace_sessions(&[old.clone()], &[new.clone()])
            .await
            .unwrap();

        assert!(store.session(&old.session_id).is_none());
        assert!(store.session(&new.session_id).is_some());
        assert_eq!(
            store.record("rec-1").unwrap().linked_session_id,
            Some(new.session_id.clone())
        );
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_old_state() {
        let old = session_with(&[("s1", "rec-1")]);
        let store = store().with_sessions([old.clone()]);
        store.fail_next_commits(1);

        let new = session_with(&[("s1", "rec-1")]);
        let result = store.replace_sessions(&[old.clone()], &[new]).await;
        assert!(result.is_err());

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, old.session_id);
        assert_eq!(
            store.record("rec-1").unwrap().linked_session_id,
            Some(old.session_id)
        );
    }

    #[tokio::test]
    async fn test_staged_swap_success() {
        let old = session_with(&[("s1", "rec-1")]);
        let store = store().with_sessions([old.clone()]);
        let new = session_with(&[("s1", "rec-1")]);

        Staged(&store)
            .replace_sessions(&[old.clone()], &[new.clone()])
            .await
            .unwrap();

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, new.session_id);
        assert_eq!(
            store.record("rec-1").unwrap().linked_session_id,
            Some(new.session_id)
        );
    }

    #[tokio::test]
    async fn test_staged_swap_failed_insert_keeps_old() {
        let old = session_with(&[("s1", "rec-1")]);
        let store = store().with_sessions([old.clone()]);
        store.fail_next_writes(1);

        let result = Staged(&store)
            .replace_sessions(&[old.clone()], &[session_with(&[("s1", "rec-1")])])
            .await;
        assert!(result.is_err());

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, old.session_id);
    }

    #[tokio::test]
    async fn test_staged_swap_failed_delete_rolls_back() {
        let old = session_with(&[("s1", "rec-1")]);
        let store = store().with_sessions([old.clone()]);
        store.fail_next_deletes(1);

        let result = Staged(&store)
            .replace_sessions(&[old.clone()], &[session_with(&[("s1", "rec-1")])])
            .await;
        assert!(result.is_err());

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, old.session_id);
        assert_eq!(
            store.record("rec-1").unwrap().linked_session_id,
            Some(old.session_id)
        );
    }
}
