//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid URL for {0}")]
    InvalidUrl(&'static str),

    #[error("{0} must use HTTPS in production")]
    MustBeHttps(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Refresh margin must be between 1 and 3600 seconds")]
    InvalidRefreshMargin,

    #[error("Minimum password length must be between 6 and 128")]
    InvalidPasswordPolicy,

    #[error("Invalid log filter: {0}")]
    InvalidLogLevel(String),
}
