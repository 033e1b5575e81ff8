//! `jobloop-scheduler` — single-threaded job scheduler with JSON snapshots.
//!
//! # Overview
//!
//! A [`Job`] wraps a [`Task`] with arguments, dependencies, a start time, a
//! working-time limit and a retry budget. Each call to [`Job::tick`] moves
//! it forward by exactly one step. The [`Scheduler`] owns a bounded pool of
//! jobs and ticks every unfinished one, pass after pass, until all of them
//! are `completed` or `failed`.
//!
//! # Job lifecycle
//!
//! | From      | Condition                                   | To          |
//! |-----------|---------------------------------------------|-------------|
//! | `waiting` | a dependency failed                          | `failed`    |
//! | `waiting` | dependencies unfinished or start time ahead  | `waiting`   |
//! | `waiting` | ready, task returns `Ok`                     | `completed` |
//! | `waiting` | ready, recoverable error, budget left        | `waiting`   |
//! | `waiting` | ready, recoverable error, budget spent       | `failed`    |
//! | `waiting` | ready, unrecoverable error                   | `failed`    |
//! | `running` | restored, working time exceeded              | `waiting` / `failed` |
//!
//! State can be saved with [`Scheduler::stop`] and restored with
//! [`Scheduler::restart`].

pub mod clock;
pub mod engine;
pub mod error;
pub mod job;
pub mod retry;
pub mod snapshot;
pub mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{RunSummary, Scheduler, StopHandle};
pub use error::{Result, SchedulerError, TaskError};
pub use job::{Job, JobState, StatusLookup, TickContext};
pub use jobloop_core::{ErrorKind, JobId, JobStatus};
pub use retry::RetryPolicy;
pub use snapshot::JobRecord;
pub use task::{task_fn, FnTask, Kwargs, Task, TaskResult};
