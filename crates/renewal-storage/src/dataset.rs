//! JSON datasets for bulk import.

use std::path::Path;

use serde::{Deserialize, Serialize};

use renewal_types::{InstructorRef, Session, StaffRef, TrainingRequirement, ValidityRecord};

use crate::error::StorageError;

/// A bundle of entities loaded in one batch.
///
/// Every collection is optional in the JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub staff: Vec<StaffRef>,
    #[serde(default)]
    pub instructors: Vec<InstructorRef>,
    #[serde(default)]
    pub requirements: Vec<TrainingRequirement>,
    #[serde(default)]
    pub records: Vec<ValidityRecord>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Dataset {
    /// Read a dataset from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Parse a dataset from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of entities.
    pub fn len(&self) -> usize {
        self.staff.len()
            + self.instructors.len()
            + self.requirements.len()
            + self.records.len()
            + self.sessions.len()
    }

    /// Whether the dataset holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub staff: usize,
    pub instructors: usize,
    pub requirements: usize,
    pub records: usize,
    pub sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_dataset_parses() {
        let dataset = Dataset::from_json(
            r#"{
                "staff": [{"staff_id": "s1", "name": "Ann"}],
                "requirements": [{
                    "requirement_id": "r1",
                    "code": "FA",
                    "name": "First Aid",
                    "validity_months": 12,
                    "category": "safety"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(dataset.staff.len(), 1);
        assert!(dataset.staff[0].active);
        assert_eq!(dataset.requirements[0].validity_months, Some(12));
        assert!(dataset.sessions.is_empty());
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_malformed_dataset_rejected() {
        let result = Dataset::from_json(r#"{"staff": 3}"#);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
