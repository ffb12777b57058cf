//! Dispatcher error types

use contracts::{ConfigError, SinkError};
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Route names a sink that was never declared
    #[error("route for signal '{signal}' references unknown sink '{sink}'")]
    UnknownSink { signal: String, sink: String },

    /// A sink failed to flush or close during shutdown
    #[error("shutdown of sink '{sink_name}' failed: {source}")]
    Shutdown {
        sink_name: String,
        #[source]
        source: SinkError,
    },

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
