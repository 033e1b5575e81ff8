//! On-disk snapshot of job states.
//!
//! A snapshot is a JSON array with one [`JobRecord`] per registered job.
//! Jobs are matched back on load by `name`, `args` and `kwargs`; ids are
//! process-local and never written.

use std::path::Path;

use chrono::{DateTime, Utc};
use jobloop_core::JobStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Result, task::Kwargs};

/// Persisted state of a single job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Kwargs,
    pub status: JobStatus,
    /// Unix milliseconds, `null` while unset.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub remaining_restarts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Write `records` to `path`, replacing whatever was there.
pub fn save(path: &Path, records: &[JobRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read the records stored at `path`.
pub fn load(path: &Path) -> Result<Vec<JobRecord>> {
    let bytes = std::fs::read(path)?;
    let records = serde_json::from_slice(&bytes)?;
    Ok(records)
}
