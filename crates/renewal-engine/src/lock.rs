//! Exclusive advisory locks keyed by generation scope.
//!
//! Only one run may touch a training requirement at a time. A run over
//! `Scope::All` conflicts with every other run; runs over explicit
//! requirement sets conflict when the sets intersect. Contention is
//! reported immediately and never queued.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// The set of training requirements a run operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Every requirement in the catalog
    #[default]
    All,
    /// An explicit set of requirement ids
    Requirements(BTreeSet<String>),
}

impl Scope {
    /// Build a scope from requirement ids. An empty list means `All`.
    pub fn requirements<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            Scope::All
        } else {
            Scope::Requirements(ids)
        }
    }

    /// Whether the scope covers a requirement.
    pub fn contains(&self, requirement_id: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Requirements(ids) => ids.contains(requirement_id),
        }
    }

    /// Requirement ids for store filters (`None` = unrestricted).
    pub fn requirement_ids(&self) -> Option<BTreeSet<String>> {
        match self {
            Scope::All => None,
            Scope::Requirements(ids) => Some(ids.clone()),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Requirements(ids) => {
                let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                write!(f, "requirements[{}]", ids.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    All,
    Requirement(String),
}

/// Table of currently held scope locks.
///
/// Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct ScopeLocks {
    held: Arc<Mutex<HashSet<LockKey>>>,
}

impl ScopeLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to lock a scope.
    ///
    /// Returns `None` if any part of the scope is already held.
    pub fn try_acquire(&self, scope: &Scope) -> Option<ScopeGuard> {
        let mut held = lock_table(&self.held);

        let keys: Vec<LockKey> = match scope {
            Scope::All => {
                if !held.is_empty() {
                    return None;
                }
                vec![LockKey::All]
            }
            Scope::Requirements(ids) => {
                if held.contains(&LockKey::All)
                    || ids
                        .iter()
                        .any(|id| held.contains(&LockKey::Requirement(id.clone())))
                {
                    return None;
                }
                ids.iter().cloned().map(LockKey::Requirement).collect()
            }
        };

        held.extend(keys.iter().cloned());
        Some(ScopeGuard {
            held: self.held.clone(),
            keys,
        })
    }

    /// Whether a requirement is currently locked, directly or through `All`.
    pub fn is_locked(&self, requirement_id: &str) -> bool {
        let held = lock_table(&self.held);
        held.contains(&LockKey::All)
            || held.contains(&LockKey::Requirement(requirement_id.to_string()))
    }

    /// Whether any lock is held.
    pub fn is_idle(&self) -> bool {
        lock_table(&self.held).is_empty()
    }
}

/// RAII guard that releases its scope when dropped.
///
/// Runs that fail, time out or panic still release their lock.
#[derive(Debug)]
pub struct ScopeGuard {
    held: Arc<Mutex<HashSet<LockKey>>>,
    keys: Vec<LockKey>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let mut held = lock_table(&self.held);
        for key in &self.keys {
            held.remove(key);
        }
    }
}

fn lock_table(table: &Mutex<HashSet<LockKey>>) -> MutexGuard<'_, HashSet<LockKey>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
