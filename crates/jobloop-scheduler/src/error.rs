use jobloop_core::ErrorKind;
use thiserror::Error;

/// Failure returned by a task body.
///
/// The variant decides whether the retry policy may restart the job; the
/// `Display` output becomes the job's recorded error string.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Network / HTTP failure (connection refused, bad status, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// Input could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// An argument had the wrong JSON type.
    #[error("type error: {0}")]
    Type(String),

    /// An argument had the right type but an unacceptable value.
    #[error("value error: {0}")]
    Value(String),

    #[error("{0}")]
    Other(String),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Transport(_) => ErrorKind::Transport,
            TaskError::Parse(_) => ErrorKind::Parse,
            TaskError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            TaskError::Io(_) => ErrorKind::Io,
            TaskError::NotFound(_) => ErrorKind::NotFound,
            TaskError::Type(_) => ErrorKind::Type,
            TaskError::Value(_) => ErrorKind::Value,
            TaskError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::Parse(e.to_string())
    }
}

/// Errors raised by the scheduler subsystem itself.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task failed with an error kind outside the retry allow-list.
    ///
    /// The job has already been marked failed when this is returned.
    #[error("job {job} failed with unrecoverable error: {source}")]
    Unrecoverable {
        job: String,
        #[source]
        source: TaskError,
    },

    /// The snapshot file could not be read or written.
    #[error("Snapshot I/O error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    /// The snapshot file is not a valid list of job records.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
