use thiserror::Error;

/// Errors raised while loading inputs or delivering reports.
///
/// Motion never produces one of these: drivers fail closed and maneuver
/// timeouts are soft. The only way a run stops early is [`Aborted`].
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid challenge layout: {0}")]
    Layout(String),

    #[error("Invalid route program: {0}")]
    Program(String),

    #[error("Report delivery failed: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// The operator pulled the abort signal in the middle of a run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("run aborted by operator")]
pub struct Aborted;

/// Result of anything that polls the abort signal.
pub type Maneuver<T> = std::result::Result<T, Aborted>;
