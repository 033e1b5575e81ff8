// Snapshot save / restore through the scheduler, including the
// log-and-continue paths for bad snapshot files.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jobloop_scheduler::{
    snapshot, task_fn, Job, JobStatus, Kwargs, Scheduler, TaskError,
};
use serde_json::{json, Value};

fn scheduler() -> Scheduler {
    Scheduler::new(10).with_poll_interval(Duration::from_millis(1))
}

fn download(site: &str) -> Job {
    Job::new(task_fn("download", |_, _| Ok(Value::Null)))
        .with_args(vec![json!([site]), json!("downloads")])
        .with_kwargs(Kwargs::from([("retries".to_string(), json!(2))]))
}

#[test]
fn saved_state_reloads_into_fresh_identical_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");

    let mut first = scheduler();
    first.schedule(download("example.com").with_tries(3));
    first.schedule(
        Job::new(task_fn("broken", |_, _| Err(TaskError::Transport("503".into())))).with_tries(1),
    );
    first.run();
    first.stop(&path);

    let mut second = scheduler();
    second.schedule(download("example.com").with_tries(3));
    second.schedule(Job::new(task_fn("broken", |_, _| Ok(Value::Null))).with_tries(1));
    assert_eq!(second.load_snapshot(&path), 2);

    for (before, after) in first.jobs().iter().zip(second.jobs()) {
        assert_eq!(before.state(), after.state());
    }
    assert_eq!(second.jobs()[1].status(), JobStatus::Failed);
    assert_eq!(second.jobs()[1].remaining_restarts(), 0);
}

#[test]
fn restart_skips_jobs_already_finished() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");

    let mut first = scheduler();
    first.schedule(download("example.com"));
    first.run();
    first.stop(&path);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut second = scheduler();
    second.schedule(
        Job::new(task_fn("download", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .with_args(vec![json!(["example.com"]), json!("downloads")])
        .with_kwargs(Kwargs::from([("retries".to_string(), json!(2))])),
    );
    second.schedule(download("example.org"));
    let summary = second.restart(&path);

    assert_eq!(summary.count(JobStatus::Completed), 2);
    // the restored job was already completed and must not run again
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn records_with_different_arguments_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");

    let mut first = scheduler();
    first.schedule(download("example.com"));
    first.run();
    first.stop(&path);

    let mut second = scheduler();
    second.schedule(download("example.net"));
    assert_eq!(second.load_snapshot(&path), 0);
    assert_eq!(second.jobs()[0].status(), JobStatus::Waiting);
}

#[test]
fn missing_snapshot_is_an_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();

    let mut scheduler = scheduler();
    scheduler.schedule(download("example.com"));
    let summary = scheduler.restart(dir.path().join("does-not-exist.json"));

    assert_eq!(summary.count(JobStatus::Completed), 1);
}

#[test]
fn malformed_snapshot_is_an_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");
    std::fs::write(&path, "[{\"name\": ").unwrap();

    let mut scheduler = scheduler();
    scheduler.schedule(download("example.com"));
    assert_eq!(scheduler.load_snapshot(&path), 0);
    assert_eq!(scheduler.jobs()[0].status(), JobStatus::Waiting);
}

#[test]
fn write_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("statuses.json");

    let mut scheduler = scheduler();
    scheduler.schedule(download("example.com"));
    scheduler.stop(&path);

    assert!(!path.exists());
    assert!(!scheduler.is_running());
}

#[test]
fn run_autosaves_when_a_snapshot_path_is_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");

    let mut scheduler = scheduler().with_snapshot_path(&path);
    scheduler.schedule(download("example.com"));
    scheduler.run();

    let records = snapshot::load(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "download");
    assert_eq!(records[0].status, JobStatus::Completed);
    assert!(records[0].ended_at.is_some());
}

#[test]
fn interrupted_running_job_is_retried_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");

    let mut record = download("example.com").with_tries(1).record();
    record.status = JobStatus::Running;
    record.started_at = chrono::DateTime::from_timestamp(1_700_000_000, 0);
    snapshot::save(&path, &[record]).unwrap();

    let mut scheduler = scheduler();
    scheduler.schedule(download("example.com").with_tries(1));
    let summary = scheduler.restart(&path);

    assert_eq!(summary.count(JobStatus::Completed), 1);
    assert_eq!(scheduler.jobs()[0].remaining_restarts(), 0);
}

#[test]
fn restored_running_job_past_its_limit_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statuses.json");

    let job = || download("example.com").with_max_working_secs(1.0);
    let mut record = job().record();
    record.status = JobStatus::Running;
    record.started_at = chrono::DateTime::from_timestamp(1_700_000_000, 0);
    snapshot::save(&path, &[record]).unwrap();

    let mut scheduler = scheduler();
    scheduler.schedule(job());
    let summary = scheduler.restart(&path);

    assert_eq!(summary.count(JobStatus::Failed), 1);
    assert_eq!(scheduler.jobs()[0].error(), Some("timeout"));
}
