//! `jobloop-core` — types, configuration and errors shared by every jobloop crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::JobloopConfig;
pub use error::{JobloopError, Result};
pub use types::{ErrorKind, JobId, JobStatus};
