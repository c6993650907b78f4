//! Fire-and-forget analytics over the request router.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::ports::{AnalyticsEvent, RequestRouter, Route};

pub struct AnalyticsTracker {
    router: Arc<dyn RequestRouter>,
    enabled: bool,
}

impl AnalyticsTracker {
    pub fn new(router: Arc<dyn RequestRouter>, enabled: bool) -> Self {
        Self { router, enabled }
    }

    /// Sends an event on a background task and returns immediately.
    ///
    /// Failures are logged and never reach the caller. Returns `None` when
    /// tracking is disabled or the event cannot be encoded. Must be called
    /// from within a Tokio runtime.
    pub fn track(&self, event: &str, properties: Value) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }

        let payload = AnalyticsEvent {
            event: event.to_string(),
            properties,
        };
        let payload = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event, "Failed to encode analytics event: {}", e);
                return None;
            }
        };

        let router = Arc::clone(&self.router);
        let event = event.to_string();
        Some(tokio::spawn(async move {
            match router.request(Route::TrackEvent, payload).await {
                Ok(_) => tracing::debug!(event = %event, "Tracked analytics event"),
                Err(e) => tracing::warn!(event = %event, "Analytics tracking failed: {}", e),
            }
        }))
    }
}
