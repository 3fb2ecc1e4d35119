//! Error types for the speed check.
//!
//! Every failure surfaces as a [`ProbeError`]. Nothing is retried: a failing
//! bridge call aborts the run and the error travels to `main` with `?`.

use thiserror::Error;

/// Convenience alias for results using the probe error type.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// The engine could not be started, did not answer, or went away.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A push or pull was rejected by the bridge.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// The engine reported an error while evaluating a command.
    #[error("Evaluation of `{command}` failed: {message}")]
    Eval { command: String, message: String },

    #[error("Session is already closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ProbeError {
    /// Re-labels a failure that happened in the middle of an array transfer.
    ///
    /// Push and pull surface every underlying failure (dead engine, scratch
    /// file I/O, engine-side errors) as [`ProbeError::Transfer`].
    pub fn into_transfer(self) -> Self {
        match self {
            ProbeError::Transfer(_) => self,
            ProbeError::SessionClosed => ProbeError::Transfer("session is closed".to_string()),
            other => ProbeError::Transfer(other.to_string()),
        }
    }
}
