//! Error taxonomy for the mortality kernel.

use thiserror::Error;

/// Errors raised while configuring or running the mortality process.
#[derive(Debug, Error)]
pub enum MortalityError {
    /// Invalid or inconsistent configuration, detected before any step runs.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persistent worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// A worker panicked while resolving its batch of cells. Mortality for
    /// the whole step is only partially applied and must be discarded.
    #[error("worker for batch {batch} panicked during sub-step {sub_step}: {message}")]
    WorkerPanicked {
        sub_step: u32,
        batch: usize,
        message: String,
    },

    /// The process was asked to run after a failed step without a reset.
    #[error("mortality step {step} failed earlier; reset the process before running again")]
    StepFailed { step: usize },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, MortalityError>;

impl MortalityError {
    /// Build a configuration error from anything printable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error was raised at configuration time.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Yaml(_))
    }
}
