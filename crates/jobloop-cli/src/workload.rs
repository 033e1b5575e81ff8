//! Demonstration tasks: create directories, then mirror each site's index
//! page into them. The scheduler sees these only as opaque [`Task`]s.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use jobloop_scheduler::{task_fn, Kwargs, Task, TaskError, TaskResult};
use serde_json::Value;
use tracing::{debug, info};

/// `make_dirs([dir, ...])` — create every directory in the list.
pub fn make_dirs() -> Arc<dyn Task> {
    task_fn("make_dirs", |args: &[Value], _: &Kwargs| -> TaskResult {
        let dirs = string_list(args, 0)?;
        for dir in &dirs {
            let path = Path::new(dir);
            if path.is_dir() {
                debug!(dir = %dir, "directory already exists");
                continue;
            }
            std::fs::create_dir_all(path)?;
            info!(dir = %dir, "directory created");
        }
        Ok(Value::from(dirs.len()))
    })
}

/// `download_urls([site, ...], save_dir)` — fetch `https://{site}` and
/// store the body at `{save_dir}/{site}/index.html`.
pub fn download_urls(timeout: Duration) -> Arc<dyn Task> {
    task_fn("download_urls", move |args: &[Value], _: &Kwargs| -> TaskResult {
        let sites = string_list(args, 0)?;
        let save_dir = args
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::Type("argument 1 must be a directory string".into()))?;

        // created and dropped on the scheduler thread, never on an async worker
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Transport(e.to_string()))?;

        let mut saved = Vec::with_capacity(sites.len());
        for site in &sites {
            let file_path = Path::new(save_dir).join(site).join("index.html");
            let body = client
                .get(format!("https://{site}"))
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.bytes())
                .map_err(|e| TaskError::Transport(format!("{site}: {e}")))?;
            std::fs::write(&file_path, &body)?;
            info!(path = %file_path.display(), bytes = body.len(), "saved");
            saved.push(Value::from(file_path.display().to_string()));
        }
        Ok(Value::Array(saved))
    })
}

/// Positional argument `index` as a list of strings.
fn string_list(args: &[Value], index: usize) -> Result<Vec<String>, TaskError> {
    let items = args
        .get(index)
        .and_then(Value::as_array)
        .ok_or_else(|| TaskError::Type(format!("argument {index} must be a list")))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| TaskError::Type(format!("argument {index} must hold strings")))
        })
        .collect()
}
