//! Error types shared across Bookrelay crates

use thiserror::Error;

/// Result type alias for Bookrelay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Main error type for Bookrelay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn invalid_env(name: impl Into<String>, value: impl Into<String>) -> Self {
        RelayError::InvalidEnv {
            name: name.into(),
            value: value.into(),
        }
    }
}
