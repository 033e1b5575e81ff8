use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobloop_core::{JobId, JobStatus};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::{Result, SchedulerError},
    retry::RetryPolicy,
    snapshot::JobRecord,
    task::{Kwargs, Task},
};

pub const DEPENDENCY_FAILED: &str = "dependent task failed";
pub const TIMEOUT: &str = "timeout";
pub const INTERRUPTED: &str = "interrupted";

/// Read-only view of other jobs' statuses, keyed by id.
///
/// `None` means the id is unknown to the view (the dependency was never
/// scheduled).
pub trait StatusLookup {
    fn status_of(&self, id: &JobId) -> Option<JobStatus>;
}

impl StatusLookup for HashMap<JobId, JobStatus> {
    fn status_of(&self, id: &JobId) -> Option<JobStatus> {
        self.get(id).copied()
    }
}

/// Everything a tick needs from outside the job.
pub struct TickContext<'a> {
    pub deps: &'a dyn StatusLookup,
    pub clock: &'a dyn Clock,
    pub policy: &'a RetryPolicy,
}

/// Mutable run state of a job; the part a snapshot saves and restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub remaining_restarts: u32,
    /// Human-readable reason, present only while `status` is `Failed`.
    pub error: Option<String>,
}

impl JobState {
    fn fresh(tries: u32) -> Self {
        Self {
            status: JobStatus::Waiting,
            started_at: None,
            ended_at: None,
            remaining_restarts: tries,
            error: None,
        }
    }
}

enum Readiness {
    Ready,
    Pending,
    Blocked(String),
}

/// A unit of work with dependencies, timing constraints and a retry budget.
///
/// A job only changes state inside [`Job::tick`] (or when a snapshot is
/// loaded into it). Arguments, constraints and dependencies are fixed once
/// the job is handed to a scheduler.
pub struct Job {
    id: JobId,
    task: Arc<dyn Task>,
    args: Vec<Value>,
    kwargs: Kwargs,
    /// `None` means unlimited.
    max_working_time: Option<Duration>,
    /// `None` means eligible immediately.
    start_at: Option<DateTime<Utc>>,
    tries: u32,
    dependencies: Vec<JobId>,
    state: JobState,
}

impl Job {
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self {
            id: JobId::new(),
            task,
            args: Vec::new(),
            kwargs: Kwargs::new(),
            max_working_time: None,
            start_at: None,
            tries: 0,
            dependencies: Vec::new(),
            state: JobState::fresh(0),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_max_working_time(mut self, limit: Duration) -> Self {
        self.max_working_time = Some(limit);
        self
    }

    /// Limit in seconds; a negative value (conventionally `-1`), or one too
    /// large to represent, means unlimited.
    pub fn with_max_working_secs(mut self, secs: f64) -> Self {
        self.max_working_time = Duration::try_from_secs_f64(secs).ok();
        self
    }

    pub fn with_start_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_at = Some(at);
        self
    }

    /// Start time as a unix timestamp; `0` clears the constraint.
    pub fn with_start_at_unix(mut self, secs: i64) -> Self {
        self.start_at = if secs == 0 {
            None
        } else {
            DateTime::from_timestamp(secs, 0)
        };
        self
    }

    /// Number of automatic restarts after a recoverable failure or timeout.
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self.state.remaining_restarts = tries;
        self
    }

    pub fn with_dependencies<'a>(mut self, deps: impl IntoIterator<Item = &'a Job>) -> Self {
        self.dependencies = deps.into_iter().map(|j| j.id.clone()).collect();
        self
    }

    // --- accessors -----------------------------------------------------------

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn max_working_time(&self) -> Option<Duration> {
        self.max_working_time
    }

    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.start_at
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn dependencies(&self) -> &[JobId] {
        &self.dependencies
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status
    }

    pub fn remaining_restarts(&self) -> u32 {
        self.state.remaining_restarts
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.state.ended_at
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    // --- state machine -------------------------------------------------------

    /// Advance the job by one step using the wall clock and the default
    /// retry policy.
    pub fn tick(&mut self, deps: &dyn StatusLookup) -> Result<JobStatus> {
        let policy = RetryPolicy::default();
        self.tick_with(&TickContext {
            deps,
            clock: &SystemClock,
            policy: &policy,
        })
    }

    /// Advance the job by exactly one step and return its resulting status.
    ///
    /// A waiting job whose constraints are met runs its task to completion
    /// inside this call. `Err(Unrecoverable)` is returned after the job has
    /// been marked failed, when the task error is outside the policy's
    /// allow-list.
    pub fn tick_with(&mut self, ctx: &TickContext<'_>) -> Result<JobStatus> {
        match self.state.status {
            JobStatus::Waiting => self.handle_waiting(ctx)?,
            JobStatus::Running => self.handle_running(ctx),
            JobStatus::Completed | JobStatus::Failed => {}
        }
        Ok(self.state.status)
    }

    fn handle_waiting(&mut self, ctx: &TickContext<'_>) -> Result<()> {
        match self.check_dependencies(ctx.deps) {
            Readiness::Ready => {}
            Readiness::Pending => {
                debug!(job = %self.name(), "dependencies not complete yet");
                return Ok(());
            }
            Readiness::Blocked(reason) => {
                error!(job = %self.name(), %reason, "cannot start job");
                self.fail(reason, ctx.clock.now());
                return Ok(());
            }
        }

        if let Some(at) = self.start_at {
            if ctx.clock.now() < at {
                debug!(job = %self.name(), start_at = %at, "job scheduled for later");
                return Ok(());
            }
        }

        self.execute(ctx)
    }

    /// Any failed or unknown dependency blocks the job for good, checked
    /// before pending ones so a failure is never masked by a slow sibling.
    fn check_dependencies(&self, deps: &dyn StatusLookup) -> Readiness {
        let mut pending = false;
        for dep in &self.dependencies {
            match deps.status_of(dep) {
                Some(JobStatus::Completed) => {}
                Some(JobStatus::Failed) => return Readiness::Blocked(DEPENDENCY_FAILED.to_string()),
                Some(JobStatus::Waiting | JobStatus::Running) => pending = true,
                None => return Readiness::Blocked(format!("dependency {dep} is not scheduled")),
            }
        }
        if pending {
            Readiness::Pending
        } else {
            Readiness::Ready
        }
    }

    fn execute(&mut self, ctx: &TickContext<'_>) -> Result<()> {
        self.state.status = JobStatus::Running;
        self.state.started_at = Some(ctx.clock.now());
        self.state.ended_at = None;
        self.state.error = None;
        info!(job = %self.name(), job_id = %self.id, "job started");

        match self.task.call(&self.args, &self.kwargs) {
            Ok(result) => {
                self.state.status = JobStatus::Completed;
                self.state.ended_at = Some(ctx.clock.now());
                info!(job = %self.name(), %result, "job completed");
                Ok(())
            }
            Err(e) if ctx.policy.is_recoverable(&e) => {
                warn!(job = %self.name(), kind = %e.kind(), "job failed: {e}");
                self.retry_or_fail(e.to_string(), ctx.clock.now());
                Ok(())
            }
            Err(e) => {
                self.fail(e.to_string(), ctx.clock.now());
                Err(SchedulerError::Unrecoverable {
                    job: self.name().to_string(),
                    source: e,
                })
            }
        }
    }

    /// Only reachable for a job restored in `Running` from a snapshot: a
    /// task executing in its own tick finishes before anything can look at it.
    fn handle_running(&mut self, ctx: &TickContext<'_>) {
        let (Some(limit), Some(started)) = (self.max_working_time, self.state.started_at) else {
            return;
        };
        let now = ctx.clock.now();
        // negative elapsed (clock went backwards) never counts as a timeout
        if let Ok(elapsed) = (now - started).to_std() {
            if elapsed > limit {
                info!(job = %self.name(), limit_secs = limit.as_secs_f64(), "job duration exceeded");
                self.retry_or_fail(TIMEOUT.to_string(), now);
            }
        }
    }

    /// Consume one restart and go back to `Waiting`, or fail when the budget
    /// is spent.
    fn retry_or_fail(&mut self, reason: String, now: DateTime<Utc>) {
        if self.state.remaining_restarts > 0 {
            self.state.remaining_restarts -= 1;
            self.state.status = JobStatus::Waiting;
            self.state.started_at = None;
            self.state.ended_at = None;
            self.state.error = None;
            info!(
                job = %self.name(),
                remaining = self.state.remaining_restarts,
                %reason,
                "restarting job"
            );
        } else {
            error!(job = %self.name(), tries = self.tries, %reason, "job max restarts exceeded");
            self.fail(reason, now);
        }
    }

    fn fail(&mut self, reason: String, now: DateTime<Utc>) {
        self.state.status = JobStatus::Failed;
        self.state.error = Some(reason);
        self.state.ended_at = Some(now);
    }

    // --- persistence ---------------------------------------------------------

    pub fn record(&self) -> JobRecord {
        JobRecord {
            name: self.name().to_string(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            status: self.state.status,
            started_at: self.state.started_at,
            ended_at: self.state.ended_at,
            remaining_restarts: self.state.remaining_restarts,
            error: self.state.error.clone(),
        }
    }

    /// Whether `record` was saved from a job with the same name and arguments.
    pub fn matches(&self, record: &JobRecord) -> bool {
        record.name == self.name() && record.args == self.args && record.kwargs == self.kwargs
    }

    /// Overwrite the live state with a persisted one.
    ///
    /// `ended_at` is kept in step with the status: a finished record
    /// without one gets `now`, an unfinished record drops it.
    pub fn load_record(&mut self, record: &JobRecord, now: DateTime<Utc>) {
        let ended_at = match (record.status.is_terminal(), record.ended_at) {
            (true, None) => {
                debug!(job = %record.name, status = %record.status, "finished record has no end time");
                Some(now)
            }
            (true, ended) => ended,
            (false, _) => None,
        };
        self.state = JobState {
            status: record.status,
            started_at: record.started_at,
            ended_at,
            remaining_restarts: record.remaining_restarts,
            error: record.error.clone(),
        };
    }

    /// Handle a job restored mid-execution whose timeout can never fire
    /// (no limit, or no start time). It goes through the retry policy as
    /// if it had failed. Returns whether anything changed.
    pub fn recover_interrupted(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.status != JobStatus::Running {
            return false;
        }
        if self.max_working_time.is_some() && self.state.started_at.is_some() {
            return false;
        }
        warn!(job = %self.name(), "job was interrupted while running");
        self.retry_or_fail(INTERRUPTED.to_string(), now);
        true
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .field("max_working_time", &self.max_working_time)
            .field("start_at", &self.start_at)
            .field("tries", &self.tries)
            .field("dependencies", &self.dependencies)
            .field("state", &self.state)
            .finish()
    }
}
