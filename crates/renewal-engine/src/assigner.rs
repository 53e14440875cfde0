//! Instructor assignment.
//!
//! A session gets the active instructor whose specializations include the
//! requirement's category and who carries the fewest sessions, ties broken
//! by instructor id. No match leaves the session without an instructor;
//! that gap is filled manually and is not an error.

use std::collections::HashMap;

use tracing::debug;

use renewal_types::{InstructorRef, Session, SessionStatus, TrainingRequirement};

/// Assigns instructors to generated sessions, tracking load across one run.
#[derive(Debug, Clone)]
pub struct InstructorAssigner {
    instructors: Vec<InstructorRef>,
    load: HashMap<String, usize>,
}

impl InstructorAssigner {
    /// Create an assigner.
    ///
    /// `existing` seeds the load with sessions that will survive the run;
    /// cancelled sessions do not count.
    pub fn new(instructors: Vec<InstructorRef>, existing: &[Session]) -> Self {
        let mut instructors: Vec<InstructorRef> =
            instructors.into_iter().filter(|i| i.active).collect();
        instructors.sort_by(|a, b| a.instructor_id.cmp(&b.instructor_id));

        let mut load = HashMap::new();
        for session in existing {
            if session.status == SessionStatus::Cancelled {
                continue;
            }
            if let Some(id) = &session.instructor_id {
                *load.entry(id.clone()).or_insert(0) += 1;
            }
        }

        Self { instructors, load }
    }

    /// Current number of sessions carried by an instructor.
    pub fn load_of(&self, instructor_id: &str) -> usize {
        self.load.get(instructor_id).copied().unwrap_or(0)
    }

    /// Attach a qualified instructor to the session, if any.
    pub fn assign(&mut self, mut session: Session, requirement: &TrainingRequirement) -> Session {
        let chosen = self
            .instructors
            .iter()
            .filter(|i| i.teaches(&requirement.category))
            .min_by(|a, b| {
                self.load_of(&a.instructor_id)
                    .cmp(&self.load_of(&b.instructor_id))
                    .then_with(|| a.instructor_id.cmp(&b.instructor_id))
            })
            .map(|i| i.instructor_id.clone());

        match chosen {
            Some(id) => {
                *self.load.entry(id.clone()).or_insert(0) += 1;
                session.instructor_id = Some(id);
            }
            None => {
                debug!(
                    session = %session.session_id,
                    category = %requirement.category,
                    "No qualified instructor available"
                );
                session.instructor_id = None;
            }
        }
        session
    }
}
