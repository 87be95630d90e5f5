//! Error types for EventFinder.
//!
//! Library crates use [`EventFinderError`] via `thiserror`.
//! The binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all EventFinder operations.
#[derive(Debug, thiserror::Error)]
pub enum EventFinderError {
    /// Configuration loading or validation error (including missing API keys).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// A collaborator call exceeded its time budget.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// A collaborator answered with a non-success HTTP status.
    #[error("{service} returned HTTP {status}: {body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },

    /// Response decoding error (JSON, HTML).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Caller input rejected before any external call.
    #[error("{message}")]
    Validation { message: String },

    /// The extraction collaborator (scraper or LLM) reported a failure.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EventFinderError>;

impl EventFinderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs,
        }
    }

    /// Create an API error from a non-success response.
    pub fn api(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            status,
            body: body.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Transient faults worth another attempt: transport errors, timeouts,
    /// rate limiting and upstream 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the caller, not the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = EventFinderError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = EventFinderError::validation("Parameter 'name' is required");
        assert_eq!(err.to_string(), "Parameter 'name' is required");

        let err = EventFinderError::timeout("search", 10);
        assert_eq!(err.to_string(), "search timed out after 10s");
    }

    #[test]
    fn retryable_classification() {
        assert!(EventFinderError::Network("connection reset".into()).is_retryable());
        assert!(EventFinderError::timeout("extract", 30).is_retryable());
        assert!(EventFinderError::api("serper", 503, "").is_retryable());
        assert!(EventFinderError::api("serper", 429, "slow down").is_retryable());
        assert!(!EventFinderError::api("serper", 401, "bad key").is_retryable());
        assert!(!EventFinderError::config("no key").is_retryable());
        assert!(!EventFinderError::validation("blank").is_retryable());
    }

    #[test]
    fn only_validation_is_client_error() {
        assert!(EventFinderError::validation("blank").is_client_error());
        assert!(!EventFinderError::Extraction("boom".into()).is_client_error());
    }
}
