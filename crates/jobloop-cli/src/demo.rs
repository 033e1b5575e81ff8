use std::path::Path;
use std::time::Duration;

use jobloop_core::config::DemoConfig;
use jobloop_scheduler::{Job, RunSummary, Scheduler};
use serde_json::json;
use tracing::{info, warn};

use crate::workload::{download_urls, make_dirs};

fn site_dir(root: &str, site: &str) -> String {
    Path::new(root).join(site).display().to_string()
}

/// Schedule the mirror pipeline and drive it to the end.
///
/// Pipeline: root dir -> one dir per site -> download every site. With
/// `late_site`, a second pipeline for that site is appended once the first
/// finished and the scheduler is resumed from `snapshot`, so the jobs that
/// already completed are not run again.
pub fn run(
    mut scheduler: Scheduler,
    demo: &DemoConfig,
    snapshot: &Path,
    resume: bool,
    late_site: Option<&str>,
) -> RunSummary {
    let timeout = Duration::from_secs(demo.http_timeout_secs);
    let site_dirs: Vec<String> = demo.sites.iter().map(|s| site_dir(&demo.root_dir, s)).collect();

    let root = Job::new(make_dirs()).with_args(vec![json!([demo.root_dir])]);
    let dirs = Job::new(make_dirs())
        .with_args(vec![json!(site_dirs)])
        .with_max_working_secs(1.0)
        .with_dependencies([&root]);
    let download = Job::new(download_urls(timeout))
        .with_args(vec![json!(demo.sites), json!(demo.root_dir)])
        .with_max_working_secs(60.0)
        .with_tries(3)
        .with_dependencies([&root, &dirs]);

    let root_id = root.id().clone();
    for job in [root, dirs, download] {
        scheduler.schedule(job);
    }

    let summary = if resume {
        scheduler.restart(snapshot)
    } else {
        scheduler.run()
    };

    let Some(site) = late_site else {
        return summary;
    };
    if scheduler.is_stop_requested() {
        warn!(site, "stop requested, not adding late site");
        return summary;
    }
    if !summary.is_finished() {
        warn!(site, "run was interrupted, not adding late site");
        return summary;
    }

    info!(site, "adding late site and resuming from snapshot");
    let late_dir = Job::new(make_dirs())
        .with_args(vec![json!([site_dir(&demo.root_dir, site)])])
        .with_max_working_secs(1.0)
        .with_dependencies(scheduler.job(&root_id));
    let late_download = Job::new(download_urls(timeout))
        .with_args(vec![json!([site]), json!(demo.root_dir)])
        .with_max_working_secs(10.0)
        .with_tries(2)
        .with_dependencies(scheduler.job(&root_id).into_iter().chain([&late_dir]));
    scheduler.schedule(late_dir);
    scheduler.schedule(late_download);

    scheduler.restart(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobloop_scheduler::JobStatus;

    #[test]
    fn pipeline_without_sites_creates_root_and_saves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mirror");
        let snapshot = dir.path().join("statuses.json");
        let demo = DemoConfig {
            root_dir: root.display().to_string(),
            sites: Vec::new(),
            http_timeout_secs: 1,
        };
        let scheduler = Scheduler::new(10)
            .with_poll_interval(Duration::from_millis(1))
            .with_snapshot_path(&snapshot);

        let summary = run(scheduler, &demo, &snapshot, false, None);

        assert_eq!(summary.count(JobStatus::Completed), 3);
        assert!(root.is_dir());
        assert!(snapshot.exists());
    }

    #[test]
    fn stop_before_start_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mirror");
        let snapshot = dir.path().join("statuses.json");
        let demo = DemoConfig {
            root_dir: root.display().to_string(),
            sites: Vec::new(),
            http_timeout_secs: 1,
        };
        let scheduler = Scheduler::new(10)
            .with_poll_interval(Duration::from_millis(1))
            .with_snapshot_path(&snapshot);
        scheduler.stop_handle().stop();

        let summary = run(scheduler, &demo, &snapshot, false, Some("example.net"));

        // the late pipeline was never added
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.count(JobStatus::Waiting), 3);
        assert!(!root.exists());
    }

    #[test]
    fn resume_does_not_rerun_completed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mirror");
        let snapshot = dir.path().join("statuses.json");
        let demo = DemoConfig {
            root_dir: root.display().to_string(),
            sites: Vec::new(),
            http_timeout_secs: 1,
        };
        let fresh = || {
            Scheduler::new(10)
                .with_poll_interval(Duration::from_millis(1))
                .with_snapshot_path(&snapshot)
        };

        run(fresh(), &demo, &snapshot, false, None);
        // removing the directory proves the resumed run does not recreate it
        std::fs::remove_dir_all(&root).unwrap();

        let summary = run(fresh(), &demo, &snapshot, true, None);
        assert_eq!(summary.count(JobStatus::Completed), 3);
        assert!(!root.exists());
    }
}
