//! Staff and instructor references from the external directories.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A staff member as reported by the staff directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRef {
    /// Unique identifier
    pub staff_id: String,

    /// Display name
    pub name: String,

    /// Whether the staff member is currently employed and active
    #[serde(default = "default_active")]
    pub active: bool,
}

impl StaffRef {
    /// Create an active staff reference.
    pub fn new(staff_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            staff_id: staff_id.into(),
            name: name.into(),
            active: true,
        }
    }

    /// Mark as inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// An instructor with the set of categories they are qualified to teach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorRef {
    /// Unique identifier
    pub instructor_id: String,

    /// Display name
    pub name: String,

    /// Requirement categories this instructor can deliver
    #[serde(default)]
    pub specializations: BTreeSet<String>,

    /// Whether the instructor is currently available for assignment
    #[serde(default = "default_active")]
    pub active: bool,
}

impl InstructorRef {
    /// Create an active instructor with the given specializations.
    pub fn new<I, S>(instructor_id: impl Into<String>, name: impl Into<String>, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instructor_id: instructor_id.into(),
            name: name.into(),
            specializations: specs.into_iter().map(Into::into).collect(),
            active: true,
        }
    }

    /// Mark as inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this instructor can teach the given category.
    pub fn teaches(&self, category: &str) -> bool {
        self.specializations.contains(category)
    }
}

fn default_active() -> bool {
    true
}
