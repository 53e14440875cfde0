//! Regeneration coordinator.
//!
//! Wraps selection, bucketizing and instructor assignment in a locked,
//! time-bounded run and commits the result as one staged swap:
//!
//! ```text
//! Idle -> Selecting -> Bucketizing -> Assigning -> Reconciling -> Committed
//!                  \____________\_____________\______________\-> Failed
//! ```
//!
//! Only auto-generated sessions in `scheduled` status are ever replaced.
//! In-progress, completed and manual sessions are left untouched and keep
//! their members out of the candidate pool.
//!
//! Timeout and cancellation are honoured up to the start of the commit.
//! Once `Reconciling` begins the store call runs to completion; a failed
//! commit leaves the previous session set in place.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use renewal_types::{EngineSettings, RecordSource, Session, SessionStatus, TrainingRequirement};

use crate::assigner::InstructorAssigner;
use crate::bucketizer::{bucketize, SessionTemplate};
use crate::lock::{Scope, ScopeLocks};
use crate::retry::RetryPolicy;
use crate::selector::{select_candidates, CandidateEntry, SelectionParams, Snapshot};
use crate::source::{CertificationStore, InstructorDirectory, SessionFilter, StaffDirectory};
use crate::{EngineError, RunState};

/// Parameters of a full generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub source: RecordSource,
    pub days_before_expiry: u32,
    pub lookahead_days: u32,
    pub capacity: u32,
    pub location: String,
    pub airport: Option<String>,
    #[serde(default)]
    pub scope: Scope,
}

impl GenerateRequest {
    /// Request built from the configured policy defaults.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            source: settings.source_type,
            days_before_expiry: settings.days_before_expiry,
            lookahead_days: settings.lookahead_days,
            capacity: settings.capacity,
            location: settings.location.clone(),
            airport: settings.airport.clone(),
            scope: Scope::All,
        }
    }

    /// Restrict the run to a scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

/// Parameters of a capacity-only rebalance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceRequest {
    pub capacity: u32,
    #[serde(default)]
    pub scope: Scope,
    /// Lead time for sessions that did not record their own
    pub default_days_before_expiry: u32,
}

impl RebalanceRequest {
    /// Rebalance every scheduled auto-generated session to `capacity`.
    pub fn new(capacity: u32, default_days_before_expiry: u32) -> Self {
        Self {
            capacity,
            scope: Scope::All,
            default_days_before_expiry,
        }
    }

    /// Restrict the rebalance to a scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

/// Caller-supplied bounds for one run.
#[derive(Debug, Clone)]
pub struct RunControl {
    /// Deadline for everything before the commit
    pub timeout: Duration,
    /// Cooperative cancellation, observed up to the commit
    pub cancel: CancellationToken,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl RunControl {
    /// Control with the given timeout and a fresh cancellation token.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a shared cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Counts reported by a committed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    /// Sessions created
    pub generated_count: usize,
    /// Roster members across the created sessions
    pub assigned_count: usize,
    /// Superseded sessions removed
    pub deleted_count: usize,
    /// Non-cancelled sessions in scope left untouched
    pub preserved_count: usize,
    /// Created sessions still lacking an instructor
    pub unassigned_instructor_count: usize,
}

struct CommitPlan {
    old: Vec<Session>,
    new: Vec<Session>,
    preserved: usize,
}

impl CommitPlan {
    fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            generated_count: self.new.len(),
            assigned_count: self.new.iter().map(|s| s.roster.len()).sum(),
            deleted_count: self.old.len(),
            preserved_count: self.preserved,
            unassigned_instructor_count: self
                .new
                .iter()
                .filter(|s| s.instructor_id.is_none())
                .count(),
        }
    }
}

/// Tracks the state of one run against its deadline and cancellation token.
struct Run<'a> {
    kind: &'static str,
    scope: &'a Scope,
    state: RunState,
    deadline: Instant,
    cancel: &'a CancellationToken,
    started: Instant,
}

impl<'a> Run<'a> {
    fn new(kind: &'static str, scope: &'a Scope, control: &'a RunControl) -> Self {
        let started = Instant::now();
        Self {
            kind,
            scope,
            state: RunState::Idle,
            deadline: started + control.timeout,
            cancel: &control.cancel,
            started,
        }
    }

    fn enter(&mut self, next: RunState) {
        debug!(
            run = self.kind,
            scope = %self.scope,
            from = %self.state,
            to = %next,
            "Run state transition"
        );
        self.state = next;
    }

    /// Abort if cancelled or past the deadline.
    fn checkpoint(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled { phase: self.state });
        }
        if Instant::now() >= self.deadline {
            return Err(EngineError::Timeout { phase: self.state });
        }
        Ok(())
    }

    /// Await `fut` bounded by the deadline and the cancellation token.
    async fn within<T, F>(&self, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        self.checkpoint()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled { phase: self.state }),
            result = tokio::time::timeout_at(self.deadline, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(EngineError::Timeout { phase: self.state }),
            },
        }
    }

    fn finish(
        &mut self,
        result: Result<GenerationSummary, EngineError>,
    ) -> Result<GenerationSummary, EngineError> {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        match &result {
            Ok(summary) => {
                self.enter(RunState::Committed);
                info!(
                    run = self.kind,
                    scope = %self.scope,
                    generated = summary.generated_count,
                    assigned = summary.assigned_count,
                    deleted = summary.deleted_count,
                    preserved = summary.preserved_count,
                    duration_ms,
                    "Run committed"
                );
            }
            Err(e) => {
                let failed_in = self.state;
                self.enter(RunState::Failed);
                error!(
                    run = self.kind,
                    scope = %self.scope,
                    failed_in = %failed_in,
                    error = %e,
                    duration_ms,
                    "Run failed"
                );
            }
        }
        result
    }
}

/// Orchestrates generation and rebalance runs against the collaborators.
pub struct RegenerationCoordinator {
    staff: Arc<dyn StaffDirectory>,
    store: Arc<dyn CertificationStore>,
    instructors: Arc<dyn InstructorDirectory>,
    locks: ScopeLocks,
    retry: RetryPolicy,
}

impl RegenerationCoordinator {
    /// Create a coordinator with default retry policy and its own lock table.
    pub fn new(
        staff: Arc<dyn StaffDirectory>,
        store: Arc<dyn CertificationStore>,
        instructors: Arc<dyn InstructorDirectory>,
    ) -> Self {
        Self {
            staff,
            store,
            instructors,
            locks: ScopeLocks::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a specific retry policy for store calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share a lock table with other coordinators.
    pub fn with_locks(mut self, locks: ScopeLocks) -> Self {
        self.locks = locks;
        self
    }

    /// The lock table guarding this coordinator's runs.
    pub fn locks(&self) -> &ScopeLocks {
        &self.locks
    }

    /// Run the full pipeline for a scope and replace its untouched
    /// auto-generated sessions with the result.
    ///
    /// # Errors
    ///
    /// `InvalidCapacity` before any work, `LockContention` if an
    /// overlapping run is active, `DataUnavailable` if a query fails,
    /// `Timeout`/`Cancelled` before commit, `CommitFailure` if write-back
    /// fails. On every error the stored session set is unchanged.
    pub async fn generate(
        &self,
        request: GenerateRequest,
        now: DateTime<Utc>,
        control: RunControl,
    ) -> Result<GenerationSummary, EngineError> {
        if request.capacity < 1 {
            return Err(EngineError::InvalidCapacity(request.capacity));
        }
        let _guard = self
            .locks
            .try_acquire(&request.scope)
            .ok_or_else(|| EngineError::LockContention(request.scope.to_string()))?;

        info!(
            scope = %request.scope,
            source = %request.source,
            capacity = request.capacity,
            lookahead_days = request.lookahead_days,
            days_before_expiry = request.days_before_expiry,
            "Starting session generation"
        );

        let mut run = Run::new("generate", &request.scope, &control);
        let result = self.generate_locked(&request, now, &mut run).await;
        run.finish(result)
    }

    async fn generate_locked(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
        run: &mut Run<'_>,
    ) -> Result<GenerationSummary, EngineError> {
        run.enter(RunState::Selecting);
        let params = SelectionParams {
            source: request.source,
            lookahead_days: request.lookahead_days,
            scope: request.scope.clone(),
        };
        let snapshot = run
            .within(Snapshot::load(
                self.staff.as_ref(),
                self.store.as_ref(),
                &params,
                &self.retry,
            ))
            .await?;

        let (replaceable, survivors): (Vec<Session>, Vec<Session>) = snapshot
            .sessions
            .iter()
            .filter(|s| request.scope.contains(&s.requirement_id))
            .cloned()
            .partition(|s| s.is_replaceable() && s.source == Some(request.source));
        let released: HashSet<String> = replaceable.iter().map(|s| s.session_id.clone()).collect();

        let groups = select_candidates(&snapshot, &params, now, &released);
        run.checkpoint()?;

        run.enter(RunState::Bucketizing);
        let mut generated = Vec::new();
        for (requirement_id, candidates) in groups {
            let template = SessionTemplate::new(requirement_id, request.location.clone())
                .with_airport(request.airport.clone())
                .with_source(request.source);
            generated.extend(bucketize(
                candidates,
                request.capacity,
                request.days_before_expiry,
                now,
                &template,
            )?);
        }
        run.checkpoint()?;

        run.enter(RunState::Assigning);
        let new = self
            .assign_instructors(run, generated, &snapshot.requirements, &survivors)
            .await?;

        let plan = CommitPlan {
            old: replaceable,
            new,
            preserved: count_preserved(&survivors),
        };
        self.commit(run, plan).await
    }

    /// Re-bucket the members of existing scheduled auto-generated sessions
    /// under a new capacity, without re-running candidate selection.
    ///
    /// Members keep their earliest-expiry-first order. Location, airport,
    /// source and lead time carry over from the earliest existing session of
    /// each requirement.
    pub async fn regenerate_with_capacity(
        &self,
        request: RebalanceRequest,
        now: DateTime<Utc>,
        control: RunControl,
    ) -> Result<GenerationSummary, EngineError> {
        if request.capacity < 1 {
            return Err(EngineError::InvalidCapacity(request.capacity));
        }
        let _guard = self
            .locks
            .try_acquire(&request.scope)
            .ok_or_else(|| EngineError::LockContention(request.scope.to_string()))?;

        info!(
            scope = %request.scope,
            capacity = request.capacity,
            "Starting capacity rebalance"
        );

        let mut run = Run::new("rebalance", &request.scope, &control);
        let result = self.rebalance_locked(&request, now, &mut run).await;
        run.finish(result)
    }

    async fn rebalance_locked(
        &self,
        request: &RebalanceRequest,
        now: DateTime<Utc>,
        run: &mut Run<'_>,
    ) -> Result<GenerationSummary, EngineError> {
        run.enter(RunState::Selecting);
        let filter = SessionFilter {
            requirement_ids: request.scope.requirement_ids(),
        };
        let store = self.store.as_ref();
        let retry = &self.retry;
        let (requirements, sessions) = run
            .within(async {
                let requirements = retry
                    .run("list requirements", || store.list_requirements())
                    .await
                    .map_err(|e| EngineError::unavailable("list requirements", e))?;
                let sessions = retry
                    .run("list sessions", || store.list_sessions(&filter))
                    .await
                    .map_err(|e| EngineError::unavailable("list sessions", e))?;
                Ok::<_, EngineError>((requirements, sessions))
            })
            .await?;
        let requirements: HashMap<String, TrainingRequirement> = requirements
            .into_iter()
            .map(|r| (r.requirement_id.clone(), r))
            .collect();

        let (mut existing, survivors): (Vec<Session>, Vec<Session>) = sessions
            .into_iter()
            .filter(|s| request.scope.contains(&s.requirement_id))
            .partition(Session::is_replaceable);
        existing.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        run.checkpoint()?;

        run.enter(RunState::Bucketizing);
        let mut groups: BTreeMap<(String, Option<RecordSource>), Vec<&Session>> = BTreeMap::new();
        for session in &existing {
            groups
                .entry((session.requirement_id.clone(), session.source))
                .or_default()
                .push(session);
        }

        let mut generated = Vec::new();
        for ((requirement_id, source), sessions) in groups {
            let first = sessions[0];
            let lead = first
                .days_before_expiry
                .unwrap_or(request.default_days_before_expiry);
            let mut template = SessionTemplate::new(requirement_id.clone(), first.location.clone())
                .with_airport(first.airport.clone());
            template.source = source;

            let members: Vec<CandidateEntry> = sessions
                .iter()
                .flat_map(|s| s.roster.iter())
                .map(|m| {
                    CandidateEntry::new(
                        m.record_id.clone(),
                        m.staff_id.clone(),
                        requirement_id.clone(),
                        m.expiry_date,
                    )
                })
                .collect();
            generated.extend(bucketize(members, request.capacity, lead, now, &template)?);
        }
        run.checkpoint()?;

        run.enter(RunState::Assigning);
        let new = self
            .assign_instructors(run, generated, &requirements, &survivors)
            .await?;

        let plan = CommitPlan {
            old: existing,
            new,
            preserved: count_preserved(&survivors),
        };
        self.commit(run, plan).await
    }

    async fn assign_instructors(
        &self,
        run: &Run<'_>,
        sessions: Vec<Session>,
        requirements: &HashMap<String, TrainingRequirement>,
        survivors: &[Session],
    ) -> Result<Vec<Session>, EngineError> {
        if sessions.is_empty() {
            return Ok(sessions);
        }

        let directory = self.instructors.as_ref();
        let retry = &self.retry;
        let instructors = run
            .within(async {
                retry
                    .run("list active instructors", || {
                        directory.list_active_instructors()
                    })
                    .await
                    .map_err(|e| EngineError::unavailable("list active instructors", e))
            })
            .await?;

        let mut assigner = InstructorAssigner::new(instructors, survivors);
        let assigned = sessions
            .into_iter()
            .map(|session| match requirements.get(&session.requirement_id) {
                Some(requirement) => assigner.assign(session, requirement),
                None => {
                    warn!(
                        requirement = %session.requirement_id,
                        "Requirement missing from catalog, leaving session without instructor"
                    );
                    session
                }
            })
            .collect();
        run.checkpoint()?;
        Ok(assigned)
    }

    async fn commit(
        &self,
        run: &mut Run<'_>,
        plan: CommitPlan,
    ) -> Result<GenerationSummary, EngineError> {
        run.enter(RunState::Reconciling);
        if plan.old.is_empty() && plan.new.is_empty() {
            debug!("Nothing to reconcile");
            return Ok(plan.summary());
        }

        let store = self.store.as_ref();
        self.retry
            .run("replace sessions", || {
                store.replace_sessions(&plan.old, &plan.new)
            })
            .await
            .map_err(|e| EngineError::CommitFailure(e.to_string()))?;

        Ok(plan.summary())
    }
}

fn count_preserved(survivors: &[Session]) -> usize {
    survivors
        .iter()
        .filter(|s| s.status != SessionStatus::Cancelled)
        .count()
}
