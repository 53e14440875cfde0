//! Collaborator trait implementations over [`Storage`].

use async_trait::async_trait;

use renewal_engine::{
    CertificationStore, InstructorDirectory, RecordFilter, SessionFilter, StaffDirectory,
    StoreError,
};
use renewal_types::{InstructorRef, Session, StaffRef, TrainingRequirement, ValidityRecord};

use crate::db::Storage;

#[async_trait]
impl StaffDirectory for Storage {
    async fn list_active_staff(&self) -> Result<Vec<StaffRef>, StoreError> {
        Ok(self.list_staff()?.into_iter().filter(|s| s.active).collect())
    }
}

#[async_trait]
impl InstructorDirectory for Storage {
    async fn list_active_instructors(&self) -> Result<Vec<InstructorRef>, StoreError> {
        Ok(self
            .list_instructors()?
            .into_iter()
            .filter(|i| i.active)
            .collect())
    }
}

#[async_trait]
impl CertificationStore for Storage {
    async fn list_requirements(&self) -> Result<Vec<TrainingRequirement>, StoreError> {
        Ok(Storage::list_requirements(self)?)
    }

    async fn list_validity_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<ValidityRecord>, StoreError> {
        Ok(self
            .list_records()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        Ok(Storage::list_sessions(self)?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn write_sessions(&self, sessions: &[Session]) -> Result<(), StoreError> {
        Ok(self.swap_sessions(&[], sessions)?)
    }

    async fn delete_sessions(&self, session_ids: &[String]) -> Result<(), StoreError> {
        Ok(self.swap_sessions(session_ids, &[])?)
    }

    async fn replace_sessions(&self, old: &[Session], new: &[Session]) -> Result<(), StoreError> {
        let old_ids: Vec<String> = old.iter().map(|s| s.session_id.clone()).collect();
        Ok(self.swap_sessions(&old_ids, new)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Months, NaiveDate, TimeZone, Utc};
    use renewal_engine::{GenerateRequest, RegenerationCoordinator, RunControl, Scope};
    use renewal_types::{RecordSource, SessionStatus};
    use tempfile::TempDir;

    use super::*;

    fn expiring(id: &str, staff: &str, expiry: NaiveDate) -> ValidityRecord {
        let issued = expiry.checked_sub_months(Months::new(12)).unwrap();
        ValidityRecord::new(id, staff, "r1", RecordSource::Certificates, issued, Some(12))
    }

    #[tokio::test]
    async fn test_inactive_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        storage.put_staff(&StaffRef::new("s1", "Al")).unwrap();
        storage.put_staff(&StaffRef::new("s2", "Bo").inactive()).unwrap();
        storage
            .put_instructor(&InstructorRef::new("i1", "Cy", ["safety"]).inactive())
            .unwrap();

        let staff = storage.list_active_staff().await.unwrap();
        assert_eq!(staff.len(), 1);
        assert!(storage.list_active_instructors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_against_rocksdb() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let today = now.date_naive();

        storage
            .put_requirement(&TrainingRequirement::new("r1", "FA", "First Aid", Some(12), "safety"))
            .unwrap();
        storage
            .put_instructor(&InstructorRef::new("i1", "Cy", ["safety"]))
            .unwrap();
        for i in 0..4 {
            let staff_id = format!("s{i}");
            storage.put_staff(&StaffRef::new(staff_id.clone(), "Staff")).unwrap();
            storage
                .put_record(&expiring(
                    &format!("rec-{i}"),
                    &staff_id,
                    today + Duration::days(10 + i),
                ))
                .unwrap();
        }

        let coordinator =
            RegenerationCoordinator::new(storage.clone(), storage.clone(), storage.clone());
        let request = GenerateRequest {
            source: RecordSource::Certificates,
            days_before_expiry: 30,
            lookahead_days: 90,
            capacity: 3,
            location: "Training Room".to_string(),
            airport: None,
            scope: Scope::All,
        };

        let summary = coordinator
            .generate(request.clone(), now, RunControl::default())
            .await
            .unwrap();
        assert_eq!(summary.generated_count, 2);
        assert_eq!(summary.assigned_count, 4);

        let sessions = Storage::list_sessions(&storage).unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.instructor_id.as_deref() == Some("i1")));
        for record in storage.list_records().unwrap() {
            assert!(record.linked_session_id.is_some());
        }

        // Started sessions survive regeneration
        let started = sessions[0].session_id.clone();
        storage
            .set_session_status(&started, SessionStatus::InProgress)
            .unwrap();
        let summary = coordinator
            .generate(request, now, RunControl::default())
            .await
            .unwrap();
        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.preserved_count, 1);
        assert!(storage.get_session(&started).unwrap().is_some());
    }
}
