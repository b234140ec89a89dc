use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classification of a failed backend call, decided once by the backend adapter.
///
/// The retrying client picks its backoff schedule from this value and never
/// inspects the error message itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport failure, timeout or transient server outage
    Network,
    /// The backend asked us to slow down (HTTP 429 and friends)
    RateLimited,
    /// Anything else, including blank or malformed responses
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network"),
            FailureKind::RateLimited => write!(f, "rate-limited"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Error returned by a [`TranslationBackend`](crate::backend::TranslationBackend).
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }
}

/// Errors raised by tabular I/O adapters.
#[derive(Debug, Error)]
pub enum TabularError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Failed to read sheet '{sheet}': {reason}")]
    Unreadable { sheet: String, reason: String },
}

/// Errors raised while persisting the state document.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
