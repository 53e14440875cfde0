//! Training requirement catalog entries.

use serde::{Deserialize, Serialize};

/// A catalog entry describing one certification or training.
///
/// Immutable once referenced by validity records; maintained by catalog
/// management outside this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRequirement {
    /// Unique identifier
    pub requirement_id: String,

    /// Short code (e.g. "DG-CAT6")
    pub code: String,

    /// Display name
    pub name: String,

    /// Validity period in months. `None` means the training never expires.
    #[serde(default)]
    pub validity_months: Option<u32>,

    /// Whether the training is mandatory for the role
    #[serde(default)]
    pub mandatory: bool,

    /// Category used to match instructor specializations
    pub category: String,
}

impl TrainingRequirement {
    /// Create a new requirement.
    pub fn new(
        requirement_id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        validity_months: Option<u32>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            requirement_id: requirement_id.into(),
            code: code.into(),
            name: name.into(),
            validity_months,
            mandatory: false,
            category: category.into(),
        }
    }

    /// Mark the requirement as mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Whether records of this requirement ever expire.
    pub fn expires(&self) -> bool {
        matches!(self.validity_months, Some(months) if months > 0)
    }
}
