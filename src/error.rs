//! Error types for jobq.

use thiserror::Error;

use crate::model::QueueState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("job queue is not running")]
    QueueNotRunning,

    #[error("job queue is full")]
    QueueFull,

    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key expired: {0}")]
    Expired(String),

    #[error("invalid queue transition: {from} -> {to}")]
    InvalidTransition { from: QueueState, to: QueueState },

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("promise closed before a result was produced")]
    PromiseClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Task(#[from] anyhow::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the two cache-miss reasons. Callers treat both as "recompute".
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Expired(_))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if !err.is_panic() {
            return Error::Other(format!("task did not complete: {err}"));
        }
        let payload = err.into_panic();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
