//! HTTP request router.
//!
//! Posts each routed request as JSON to `{base_url}/{route}` and maps HTTP
//! status codes onto `RouterError`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RouterConfig;
use crate::ports::{RequestRouter, Route, RouterError};

pub struct HttpRequestRouter {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpRequestRouter {
    /// Builds a router from configuration.
    pub fn new(config: &RouterConfig) -> Result<Self, RouterError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RouterError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// URL a route is posted to.
    pub fn endpoint(&self, route: Route) -> String {
        format!("{}/{}", self.base_url, route.as_str())
    }
}

/// Maps a non-success status and body onto a router error.
fn error_for_status(status: u16, body: String) -> RouterError {
    match status {
        404 => RouterError::NotFound(body),
        409 => RouterError::Conflict(body),
        _ => RouterError::Rejected {
            status,
            message: body,
        },
    }
}

#[async_trait]
impl RequestRouter for HttpRequestRouter {
    async fn request(&self, route: Route, payload: Value) -> Result<Value, RouterError> {
        let url = self.endpoint(route);
        tracing::debug!(route = %route, "Routing request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(route = %route, "Request failed: {}", e);
                RouterError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), body));
        }

        if status.as_u16() == 204 {
            return Ok(Value::Null);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RouterError::InvalidPayload(e.to_string()))
    }
}
