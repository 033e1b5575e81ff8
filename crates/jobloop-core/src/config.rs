use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::ErrorKind;

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SNAPSHOT_PATH: &str = "statuses.json";
pub const DEFAULT_LOG_FILTER: &str = "jobloop_cli=info,jobloop_scheduler=info";

/// Top-level config (jobloop.toml + JOBLOOP_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobloopConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of jobs a scheduler accepts.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Pause between two passes of the run loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Snapshot file, written by `run` on exit while `autosave` is on.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: Option<String>,
    #[serde(default = "default_autosave")]
    pub autosave: bool,
    /// Task error kinds that consume a retry instead of failing the job.
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<ErrorKind>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            snapshot_path: default_snapshot_path(),
            autosave: default_autosave(),
            retry_on: default_retry_on(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Settings for the bundled demonstration workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,
    /// HTTP request timeout for page downloads.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            sites: default_sites(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_snapshot_path() -> Option<String> {
    Some(DEFAULT_SNAPSHOT_PATH.to_string())
}
fn default_autosave() -> bool {
    true
}
fn default_retry_on() -> Vec<ErrorKind> {
    ErrorKind::DEFAULT_RECOVERABLE.to_vec()
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
fn default_root_dir() -> String {
    "downloads".to_string()
}
fn default_sites() -> Vec<String> {
    vec![
        "example.com".to_string(),
        "example.org".to_string(),
        "www.rust-lang.org".to_string(),
    ]
}
fn default_http_timeout_secs() -> u64 {
    30
}

impl JobloopConfig {
    /// Load config from a TOML file with JOBLOOP_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `JOBLOOP_SCHEDULER__POOL_SIZE=4`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("jobloop.toml");
        tracing::debug!(path, "loading configuration");

        let config: JobloopConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("JOBLOOP_").split("__"))
            .extract()
            .map_err(|e| crate::error::JobloopError::Config(e.to_string()))?;

        Ok(config)
    }
}
