//! Session lifecycle configuration

use serde::Deserialize;
use std::time::Duration;

use super::environment::{check_url, Environment};
use super::error::ValidationError;

/// Settings of the auth state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Renew the token this many seconds before it expires
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,

    /// Target of the sign-up verification email link
    pub email_redirect_url: String,

    /// Target of the password-reset email link
    pub password_reset_redirect_url: String,

    /// Local storage key prefix for the cached AI context
    #[serde(default = "default_ai_context_key_prefix")]
    pub ai_context_key_prefix: String,

    /// Whether auth outcomes are reported to analytics
    #[serde(default = "default_analytics_enabled")]
    pub analytics_enabled: bool,

    /// Minimum password length accepted at sign-up
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl SessionConfig {
    /// Get the refresh margin as Duration
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    /// Validate session configuration
    ///
    /// Redirect targets must be HTTPS in production.
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.refresh_margin_secs == 0 || self.refresh_margin_secs > 3600 {
            return Err(ValidationError::InvalidRefreshMargin);
        }
        if !(6..=128).contains(&self.min_password_length) {
            return Err(ValidationError::InvalidPasswordPolicy);
        }
        if self.ai_context_key_prefix.is_empty() {
            return Err(ValidationError::MissingRequired("AI_CONTEXT_KEY_PREFIX"));
        }
        check_url(&self.email_redirect_url, "EMAIL_REDIRECT_URL", environment)?;
        check_url(
            &self.password_reset_redirect_url,
            "PASSWORD_RESET_REDIRECT_URL",
            environment,
        )?;
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: default_refresh_margin(),
            email_redirect_url: "http://localhost:3000/auth/callback".to_string(),
            password_reset_redirect_url: "http://localhost:3000/auth/reset-password".to_string(),
            ai_context_key_prefix: default_ai_context_key_prefix(),
            analytics_enabled: default_analytics_enabled(),
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_refresh_margin() -> u64 {
    300
}

fn default_ai_context_key_prefix() -> String {
    "ai_context:".to_string()
}

fn default_analytics_enabled() -> bool {
    true
}

fn default_min_password_length() -> usize {
    8
}
