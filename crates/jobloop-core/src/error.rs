use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobloopError {
    /// The config file or environment could not be merged into a valid config.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JobloopError {
    /// Short error code string, stable across releases for log filtering.
    pub fn code(&self) -> &'static str {
        match self {
            JobloopError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, JobloopError>;
