use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use jobloop_core::{config::SchedulerConfig, JobId, JobStatus};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    job::{Job, StatusLookup, TickContext},
    retry::RetryPolicy,
    snapshot::{self, JobRecord},
};

/// Count of jobs per status at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary(BTreeMap<JobStatus, usize>);

impl RunSummary {
    pub fn count(&self, status: JobStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobStatus, usize)> + '_ {
        self.0.iter().map(|(s, n)| (*s, *n))
    }

    /// Whether every counted job reached `completed` or `failed`.
    pub fn is_finished(&self) -> bool {
        self.0.keys().all(|s| s.is_terminal())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(s, n)| format!("{s}: {n}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Cloneable handle that ends a [`Scheduler::run`] loop from another thread.
///
/// The loop notices between two passes; a task already executing is never
/// interrupted. The request is latched: once stopped, later calls to `run`
/// or `restart` on the same scheduler return without ticking.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Jobs on either side of the one being ticked.
struct Siblings<'a> {
    before: &'a [Job],
    after: &'a [Job],
}

impl StatusLookup for Siblings<'_> {
    fn status_of(&self, id: &JobId) -> Option<JobStatus> {
        self.before
            .iter()
            .chain(self.after)
            .find(|j| j.id() == id)
            .map(Job::status)
    }
}

/// Bounded, single-threaded job pool driven by a polling loop.
///
/// Jobs are ticked in registration order. A job's task runs synchronously
/// inside its tick, so one slow task holds up the whole loop.
pub struct Scheduler {
    pool_size: usize,
    jobs: Vec<Job>,
    running: Arc<AtomicBool>,
    shutdown: Arc<watch::Sender<bool>>,
    poll_interval: Duration,
    /// If set, `run` saves a snapshot here when it returns.
    snapshot_path: Option<PathBuf>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            jobs: Vec::with_capacity(pool_size),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(watch::channel(false).0),
            poll_interval: Duration::from_millis(jobloop_core::config::DEFAULT_POLL_INTERVAL_MS),
            snapshot_path: None,
            retry_policy: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        let mut scheduler = Self::new(config.pool_size)
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
            .with_retry_policy(RetryPolicy::new(config.retry_on.iter().copied()));
        scheduler.snapshot_path = config
            .snapshot_path
            .as_ref()
            .filter(|_| config.autosave)
            .map(PathBuf::from);
        scheduler
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register `job`. Returns `false` (and logs) when the pool is full.
    pub fn schedule(&mut self, job: Job) -> bool {
        if self.jobs.len() >= self.pool_size {
            error!(
                job = %job.name(),
                pool_size = self.pool_size,
                "cannot add job, pool is full"
            );
            return false;
        }
        debug!(job = %job.name(), job_id = %job.id(), args = ?job.args(), "job scheduled");
        self.jobs.push(job);
        true
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id() == id)
    }

    /// All registered jobs in registration order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether a [`StopHandle`] asked this scheduler to stop.
    pub fn is_stop_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Count jobs per status and log each line.
    pub fn summary(&self) -> RunSummary {
        let mut counts = BTreeMap::new();
        for job in &self.jobs {
            *counts.entry(job.status()).or_insert(0) += 1;
        }
        let summary = RunSummary(counts);
        for (status, count) in summary.iter() {
            info!(%status, count, "job summary");
        }
        summary
    }

    /// Tick every unfinished job until none is left, then report.
    ///
    /// Returns early, with unfinished jobs counted in the summary, if a
    /// [`StopHandle`] asks to stop, including before this call.
    pub fn run(&mut self) -> RunSummary {
        if self.is_stop_requested() {
            warn!("stop already requested, not starting the run loop");
        } else {
            self.running.store(true, Ordering::SeqCst);
            info!(jobs = self.jobs.len(), "scheduler started");
        }

        while self.running.load(Ordering::SeqCst) && !self.is_stop_requested() {
            let pending: Vec<usize> = self
                .jobs
                .iter()
                .enumerate()
                .filter(|(_, j)| !j.status().is_terminal())
                .map(|(i, _)| i)
                .collect();

            if pending.is_empty() {
                info!("all jobs finished");
                break;
            }

            for i in pending {
                self.tick_job(i);
            }
            std::thread::sleep(self.poll_interval);
        }

        if self.jobs.iter().any(|j| !j.status().is_terminal()) {
            warn!("scheduler stopped before all jobs finished");
        }
        let summary = self.summary();
        match self.snapshot_path.clone() {
            Some(path) => self.stop(path),
            None => self.running.store(false, Ordering::SeqCst),
        }
        summary
    }

    fn tick_job(&mut self, index: usize) {
        let (before, rest) = self.jobs.split_at_mut(index);
        let Some((job, after)) = rest.split_first_mut() else {
            return;
        };
        let siblings = Siblings {
            before: &*before,
            after: &*after,
        };
        let ctx = TickContext {
            deps: &siblings,
            clock: self.clock.as_ref(),
            policy: &self.retry_policy,
        };

        match job.tick_with(&ctx) {
            Ok(status) => debug!(job = %job.name(), %status, "job ticked"),
            // the job is already marked failed; keep the loop going for the rest
            Err(e) => error!(job_id = %job.id(), "{e}"),
        }
    }

    /// Clear the running flag and save every job's state to `path`.
    ///
    /// Write failures are logged, not returned.
    pub fn stop(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.running.store(false, Ordering::SeqCst);

        let records: Vec<JobRecord> = self.jobs.iter().map(Job::record).collect();
        match snapshot::save(path, &records) {
            Ok(()) => info!(
                path = %path.display(),
                jobs = records.len(),
                "scheduler stopped, snapshot saved"
            ),
            Err(e) => error!(path = %path.display(), "failed to write snapshot: {e}"),
        }
    }

    /// Overwrite live job state from the snapshot at `path`.
    ///
    /// Each record goes to the first registered job with the same name,
    /// args and kwargs. A missing or unreadable snapshot is logged and
    /// treated as empty. Returns how many records were applied.
    pub fn load_snapshot(&mut self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let records = match snapshot::load(path) {
            Ok(records) => {
                info!(path = %path.display(), records = records.len(), "snapshot loaded");
                records
            }
            Err(e) => {
                error!(path = %path.display(), "cannot load snapshot, starting fresh: {e}");
                Vec::new()
            }
        };

        let now = self.clock.now();
        let mut applied = 0;
        for record in &records {
            match self.jobs.iter_mut().find(|j| j.matches(record)) {
                Some(job) => {
                    job.load_record(record, now);
                    job.recover_interrupted(now);
                    applied += 1;
                }
                None => debug!(job = %record.name, "no scheduled job matches snapshot record"),
            }
        }
        applied
    }

    /// Restore state from `path` and resume the run loop.
    pub fn restart(&mut self, path: impl AsRef<Path>) -> RunSummary {
        let applied = self.load_snapshot(path);
        info!(restored = applied, "scheduler restarted");
        self.run()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(jobloop_core::config::DEFAULT_POOL_SIZE)
    }
}
