//! Error types for hireflow.
//!
//! Library crates use [`HireflowError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all hireflow operations.
#[derive(Debug, thiserror::Error)]
pub enum HireflowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required capability cannot be reached at all (bad credentials,
    /// unreachable host, refused connection).
    #[error("{capability} unreachable: {message}")]
    Connectivity { capability: String, message: String },

    /// Transient network/HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// The remote side asked us to slow down.
    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// A capability call did not finish within its deadline.
    #[error("{capability} timed out after {after_ms} ms")]
    Timeout { capability: String, after_ms: u64 },

    /// The capability declined the request (precondition absent, no data).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The capability answered with a non-retryable error.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Input could not be turned into structured data.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (out-of-range value, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON/TOML (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HireflowError>;

impl HireflowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a connectivity error for the named capability.
    pub fn connectivity(capability: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connectivity {
            capability: capability.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }

    /// Whether this error must abort a run when raised before candidate processing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Connectivity { .. })
    }

    /// Server-provided backoff hint, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HireflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
