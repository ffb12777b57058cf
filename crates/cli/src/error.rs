//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    /// A `--field` argument without `=`
    #[error("Invalid field '{arg}': expected KEY=VALUE")]
    InvalidField { arg: String },

    /// A `--field` argument with an empty key
    #[error("Invalid field '{arg}': key cannot be empty")]
    EmptyFieldKey { arg: String },
}

impl CliError {
    pub fn invalid_field(arg: impl Into<String>) -> Self {
        Self::InvalidField { arg: arg.into() }
    }

    pub fn empty_field_key(arg: impl Into<String>) -> Self {
        Self::EmptyFieldKey { arg: arg.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
