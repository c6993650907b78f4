//! Request router configuration

use serde::Deserialize;

use super::environment::{check_url, Environment};
use super::error::ValidationError;

/// Settings for the HTTP request router adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Base URL routes are appended to
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl RouterConfig {
    /// Validate router configuration
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        check_url(&self.base_url, "ROUTER_BASE_URL", environment)?;
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, timeout_secs: u64) -> RouterConfig {
        RouterConfig {
            base_url: base_url.to_string(),
            timeout_secs,
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(config("https://api.example.com", 30)
            .validate(Environment::Production)
            .is_ok());
    }

    #[test]
    fn test_validation_rejects_timeout_out_of_range() {
        assert_eq!(
            config("https://api.example.com", 0).validate(Environment::Development),
            Err(ValidationError::InvalidTimeout)
        );
        assert_eq!(
            config("https://api.example.com", 301).validate(Environment::Development),
            Err(ValidationError::InvalidTimeout)
        );
    }

    #[test]
    fn test_validation_missing_base_url() {
        assert_eq!(
            config("", 30).validate(Environment::Development),
            Err(ValidationError::MissingRequired("ROUTER_BASE_URL"))
        );
    }
}
