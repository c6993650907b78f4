//! Deployment environment

use serde::Deserialize;

/// Application environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

/// Checks that `url` is an http(s) URL, and HTTPS when `environment` is
/// production.
pub(crate) fn check_url(
    url: &str,
    name: &'static str,
    environment: Environment,
) -> Result<(), super::ValidationError> {
    use super::ValidationError;

    if url.is_empty() {
        return Err(ValidationError::MissingRequired(name));
    }
    let is_https = url.starts_with("https://");
    if !is_https && !url.starts_with("http://") {
        return Err(ValidationError::InvalidUrl(name));
    }
    if environment.is_production() && !is_https {
        return Err(ValidationError::MustBeHttps(name));
    }
    Ok(())
}
