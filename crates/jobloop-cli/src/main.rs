use std::path::PathBuf;

use clap::Parser;
use jobloop_core::config::{JobloopConfig, DEFAULT_SNAPSHOT_PATH};
use jobloop_scheduler::Scheduler;
use tracing::{info, warn};

mod demo;
mod workload;

#[derive(Parser)]
#[command(name = "jobloop")]
#[command(version)]
#[command(about = "Run the jobloop demo: create directories, then mirror site index pages")]
struct Cli {
    /// Configuration file path (default: $JOBLOOP_CONFIG or ./jobloop.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Snapshot file written on exit and read by --resume
    #[arg(short, long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Directory the pages are mirrored into (overrides config)
    #[arg(short, long, value_name = "DIR")]
    root: Option<String>,

    /// Site to mirror; repeat for several (overrides config)
    #[arg(long = "site", value_name = "HOST")]
    sites: Vec<String>,

    /// Site appended after the first run, picked up by resuming from the snapshot
    #[arg(long, value_name = "HOST")]
    late_site: Option<String>,

    /// Restore job states from the snapshot before running
    #[arg(long)]
    resume: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // load config: --config > JOBLOOP_CONFIG env > ./jobloop.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("JOBLOOP_CONFIG").ok());
    let (mut config, load_error) = match JobloopConfig::load(config_path.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (JobloopConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.filter.as_str().into()),
        )
        .init();

    if let Some(e) = load_error {
        warn!("Config load failed ({}), using defaults", e);
    }

    if let Some(root) = cli.root {
        config.demo.root_dir = root;
    }
    if !cli.sites.is_empty() {
        config.demo.sites = cli.sites;
    }
    let snapshot = cli
        .snapshot
        .or_else(|| config.scheduler.snapshot_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH));

    let mut scheduler = Scheduler::from_config(&config.scheduler);
    if config.scheduler.autosave {
        scheduler = scheduler.with_snapshot_path(&snapshot);
    } else {
        info!("snapshot autosave disabled");
    }
    let stop = scheduler.stop_handle();
    info!(
        pool_size = scheduler.pool_size(),
        snapshot = %snapshot.display(),
        sites = config.demo.sites.len(),
        "starting demo workload"
    );

    // the loop blocks on every task, so it gets its own thread
    let demo = config.demo.clone();
    let mut run = tokio::task::spawn_blocking(move || {
        demo::run(scheduler, &demo, &snapshot, cli.resume, cli.late_site.as_deref())
    });

    let summary = tokio::select! {
        joined = &mut run => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received, stopping after the current pass");
            stop.stop();
            run.await?
        }
    };

    info!(%summary, "all done");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
