//! Layered error definitions
//!
//! Categorized by source: sink processing / policy rejection / incomplete / config

use std::time::Duration;
use thiserror::Error;

/// Error returned by [`Sink::process`](crate::Sink::process) and the adapters around it.
#[derive(Debug, Error)]
pub enum SinkError {
    // ===== Handler Errors =====
    /// The handler ran and reported a failure
    #[error("sink '{sink_name}' failed: {message}")]
    Handler { sink_name: String, message: String },

    /// The event could not be encoded for output
    #[error("sink '{sink_name}' encode error: {message}")]
    Encode { sink_name: String, message: String },

    /// The sink could not be constructed and rejects every call
    #[error("sink '{sink_name}' unavailable: {message}")]
    Unavailable { sink_name: String, message: String },

    // ===== Policy Rejections =====
    /// Circuit breaker is open, inner sink was not invoked
    #[error("circuit open for sink '{sink_name}'")]
    CircuitOpen { sink_name: String },

    /// No rate limit token was available, inner sink was not invoked
    #[error("rate limit exceeded for sink '{sink_name}'")]
    RateLimited { sink_name: String },

    // ===== Incomplete =====
    /// The sink did not finish before the adapter's deadline
    #[error("sink '{sink_name}' timed out after {after:?}")]
    Timeout { sink_name: String, after: Duration },

    /// The caller's context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Create handler error
    pub fn handler(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create encode error
    pub fn encode(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create unavailable error
    pub fn unavailable(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create timeout error
    pub fn timeout(sink_name: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            sink_name: sink_name.into(),
            after,
        }
    }

    /// Circuit-open or rate-limited: the inner handler never ran.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::RateLimited { .. })
    }

    /// The work did not finish (timeout, cancellation, deadline).
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Cancelled | Self::DeadlineExceeded
        )
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create configuration parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(SinkError::RateLimited {
            sink_name: "s".into()
        }
        .is_rejection());
        assert!(SinkError::CircuitOpen {
            sink_name: "s".into()
        }
        .is_rejection());
        assert!(!SinkError::handler("s", "boom").is_rejection());

        assert!(SinkError::timeout("s", Duration::from_millis(5)).is_incomplete());
        assert!(SinkError::Cancelled.is_incomplete());
        assert!(SinkError::DeadlineExceeded.is_incomplete());
        assert!(!SinkError::handler("s", "boom").is_incomplete());
    }

    #[test]
    fn test_display_includes_sink_name() {
        let err = SinkError::handler("audit", "disk full");
        assert_eq!(err.to_string(), "sink 'audit' failed: disk full");

        let err = ConfigError::validation("routes[0].sinks", "unknown sink 'x'");
        assert!(err.to_string().contains("routes[0].sinks"));
    }
}
