//! RocksDB wrapper for renewal storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Upserts and full scans per entity
//! - Atomic session swap with record relinking in one write batch
//! - Batched dataset import

use std::collections::HashSet;
use std::path::Path;

use rocksdb::{ColumnFamily, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use renewal_types::{InstructorRef, Session, StaffRef, TrainingRequirement, ValidityRecord};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_INSTRUCTORS, CF_RECORDS, CF_REQUIREMENTS,
    CF_SESSIONS, CF_STAFF,
};
use crate::dataset::{Dataset, ImportStats};
use crate::error::StorageError;

/// Main storage interface for the renewal engine
pub struct Storage {
    db: DB,
}

/// Entity counts for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub staff_count: usize,
    pub instructor_count: usize,
    pub requirement_count: usize,
    pub record_count: usize,
    pub session_count: usize,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, id: &str) -> Result<Option<T>, StorageError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>, StorageError> {
        let cf = self.cf(cf_name)?;
        let mut results = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            results.push(serde_json::from_slice(&value)?);
        }
        Ok(results)
    }

    fn put<T: Serialize>(&self, cf_name: &str, id: &str, value: &T) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, id.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    // ==================== Directory Methods ====================

    /// Store a staff member
    pub fn put_staff(&self, staff: &StaffRef) -> Result<(), StorageError> {
        self.put(CF_STAFF, &staff.staff_id, staff)
    }

    /// All staff members, active or not, ordered by id
    pub fn list_staff(&self) -> Result<Vec<StaffRef>, StorageError> {
        self.scan(CF_STAFF)
    }

    /// Store an instructor
    pub fn put_instructor(&self, instructor: &InstructorRef) -> Result<(), StorageError> {
        self.put(CF_INSTRUCTORS, &instructor.instructor_id, instructor)
    }

    /// All instructors ordered by id
    pub fn list_instructors(&self) -> Result<Vec<InstructorRef>, StorageError> {
        self.scan(CF_INSTRUCTORS)
    }

    // ==================== Catalog and Record Methods ====================

    /// Store a catalog entry
    pub fn put_requirement(&self, requirement: &TrainingRequirement) -> Result<(), StorageError> {
        self.put(CF_REQUIREMENTS, &requirement.requirement_id, requirement)
    }

    /// The requirement catalog ordered by id
    pub fn list_requirements(&self) -> Result<Vec<TrainingRequirement>, StorageError> {
        self.scan(CF_REQUIREMENTS)
    }

    /// Store a validity record
    pub fn put_record(&self, record: &ValidityRecord) -> Result<(), StorageError> {
        self.put(CF_RECORDS, &record.record_id, record)
    }

    /// Get a validity record by id
    pub fn get_record(&self, record_id: &str) -> Result<Option<ValidityRecord>, StorageError> {
        self.get(CF_RECORDS, record_id)
    }

    /// All validity records ordered by id
    pub fn list_records(&self) -> Result<Vec<ValidityRecord>, StorageError> {
        self.scan(CF_RECORDS)
    }

    // ==================== Session Methods ====================

    /// Get a session by id
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        self.get(CF_SESSIONS, session_id)
    }

    /// All sessions ordered by id
    pub fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        self.scan(CF_SESSIONS)
    }

    /// Update the status of a stored session
    pub fn set_session_status(
        &self,
        session_id: &str,
        status: renewal_types::SessionStatus,
    ) -> Result<(), StorageError> {
        let mut session = self
            .get_session(session_id)?
            .ok_or_else(|| StorageError::NotFound(format!("session {session_id}")))?;
        session.status = status;
        self.put(CF_SESSIONS, session_id, &session)
    }

    /// Atomically delete `remove` sessions and upsert `insert` sessions.
    ///
    /// Records linked to removed sessions are unlinked; roster records of
    /// inserted sessions are linked to them. Everything lands in one write
    /// batch, so a failure leaves the previous state untouched.
    pub fn swap_sessions(&self, remove: &[String], insert: &[Session]) -> Result<(), StorageError> {
        check_sessions(insert)?;

        let sessions_cf = self.cf(CF_SESSIONS)?;
        let records_cf = self.cf(CF_RECORDS)?;

        let removed: HashSet<&str> = remove.iter().map(String::as_str).collect();
        let mut records: Vec<ValidityRecord> = Vec::new();
        let mut touched: HashSet<String> = HashSet::new();

        for record in self.list_records()? {
            if record
                .linked_session_id
                .as_deref()
                .is_some_and(|id| removed.contains(id))
            {
                touched.insert(record.record_id.clone());
                records.push(ValidityRecord {
                    linked_session_id: None,
                    ..record
                });
            } else {
                records.push(record);
            }
        }

        for session in insert {
            for member in &session.roster {
                if let Some(record) = records.iter_mut().find(|r| r.record_id == member.record_id) {
                    record.linked_session_id = Some(session.session_id.clone());
                    touched.insert(record.record_id.clone());
                }
            }
        }

        let mut batch = WriteBatch::default();
        for id in remove {
            batch.delete_cf(sessions_cf, id.as_bytes());
        }
        for session in insert {
            batch.put_cf(
                sessions_cf,
                session.session_id.as_bytes(),
                serde_json::to_vec(session)?,
            );
        }
        for record in records.iter().filter(|r| touched.contains(&r.record_id)) {
            batch.put_cf(records_cf, record.record_id.as_bytes(), serde_json::to_vec(record)?);
        }

        self.db.write(batch)?;
        debug!(
            removed = remove.len(),
            inserted = insert.len(),
            relinked = touched.len(),
            "Swapped sessions"
        );
        Ok(())
    }

    // ==================== Bulk Methods ====================

    /// Upsert every entity of a dataset in one write batch.
    ///
    /// Records keep the links they carry in the dataset; sessions in the
    /// dataset link their roster records.
    pub fn import(&self, dataset: &Dataset) -> Result<ImportStats, StorageError> {
        check_sessions(&dataset.sessions)?;

        let mut records = dataset.records.clone();
        for session in &dataset.sessions {
            for member in &session.roster {
                if let Some(record) = records.iter_mut().find(|r| r.record_id == member.record_id) {
                    record.linked_session_id = Some(session.session_id.clone());
                }
            }
        }

        let mut batch = WriteBatch::default();
        let staff_cf = self.cf(CF_STAFF)?;
        for staff in &dataset.staff {
            batch.put_cf(staff_cf, staff.staff_id.as_bytes(), serde_json::to_vec(staff)?);
        }
        let instructors_cf = self.cf(CF_INSTRUCTORS)?;
        for instructor in &dataset.instructors {
            batch.put_cf(
                instructors_cf,
                instructor.instructor_id.as_bytes(),
                serde_json::to_vec(instructor)?,
            );
        }
        let requirements_cf = self.cf(CF_REQUIREMENTS)?;
        for requirement in &dataset.requirements {
            batch.put_cf(
                requirements_cf,
                requirement.requirement_id.as_bytes(),
                serde_json::to_vec(requirement)?,
            );
        }
        let records_cf = self.cf(CF_RECORDS)?;
        for record in &records {
            batch.put_cf(records_cf, record.record_id.as_bytes(), serde_json::to_vec(record)?);
        }
        let sessions_cf = self.cf(CF_SESSIONS)?;
        for session in &dataset.sessions {
            batch.put_cf(
                sessions_cf,
                session.session_id.as_bytes(),
                serde_json::to_vec(session)?,
            );
        }

        self.db.write(batch)?;

        let stats = ImportStats {
            staff: dataset.staff.len(),
            instructors: dataset.instructors.len(),
            requirements: dataset.requirements.len(),
            records: records.len(),
            sessions: dataset.sessions.len(),
        };
        info!(?stats, "Imported dataset");
        Ok(stats)
    }

    /// Count entities in every column family
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let count = |name: &str| -> Result<usize, StorageError> {
            let cf = self.cf(name)?;
            let mut n = 0;
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                item?;
                n += 1;
            }
            Ok(n)
        };

        Ok(StorageStats {
            staff_count: count(CF_STAFF)?,
            instructor_count: count(CF_INSTRUCTORS)?,
            requirement_count: count(CF_REQUIREMENTS)?,
            record_count: count(CF_RECORDS)?,
            session_count: count(CF_SESSIONS)?,
        })
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }
}

/// Reject session sets that overflow capacity or repeat an id.
fn check_sessions(sessions: &[Session]) -> Result<(), StorageError> {
    let mut seen = HashSet::new();
    for session in sessions {
        if !session.within_capacity() {
            return Err(StorageError::Rejected(format!(
                "session {} roster {} exceeds capacity {}",
                session.session_id,
                session.roster.len(),
                session.capacity
            )));
        }
        if !seen.insert(session.session_id.as_str()) {
            return Err(StorageError::Rejected(format!(
                "duplicate session id {}",
                session.session_id
            )));
        }
    }
    Ok(())
}
