//! In-memory request router.
//!
//! Serves the profile and analytics routes from process memory. Profile
//! creation is atomic per user id and reports duplicates as
//! `RouterError::Conflict`, matching the backend's unique-key behaviour.
//! Failures can be injected per route for error-path testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::adapters::clock::SystemClock;
use crate::domain::foundation::UserId;
use crate::domain::profile::UserProfile;
use crate::ports::{
    AnalyticsEvent, Clock, ProfileLookup, ProfilePatch, RequestRouter, Route, RouterError,
};

pub struct InMemoryRequestRouter {
    profiles: Mutex<HashMap<UserId, UserProfile>>,
    events: Mutex<Vec<AnalyticsEvent>>,
    calls: Mutex<Vec<Route>>,
    failures: RwLock<HashMap<Route, RouterError>>,
    stalled: RwLock<HashSet<Route>>,
    /// Number of upcoming `profiles.get` calls that report not-found
    /// regardless of contents.
    forced_misses: AtomicUsize,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRequestRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRequestRouter {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failures: RwLock::new(HashMap::new()),
            stalled: RwLock::new(HashSet::new()),
            forced_misses: AtomicUsize::new(0),
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses the given clock to stamp `last_active` on updates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seeds a stored profile.
    pub fn with_profile(self, profile: UserProfile) -> Self {
        self.insert_profile(profile);
        self
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    /// Returns the stored profile for a user.
    pub fn profile(&self, user_id: &UserId) -> Option<UserProfile> {
        self.profiles.lock().unwrap().get(user_id).cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }

    /// Makes every call to `route` fail with `error`.
    pub fn fail_route(&self, route: Route, error: RouterError) {
        self.failures.write().unwrap().insert(route, error);
    }

    pub fn clear_failure(&self, route: Route) {
        self.failures.write().unwrap().remove(&route);
    }

    /// Makes every call to `route` hang forever, like an endpoint that never
    /// answers.
    pub fn stall_route(&self, route: Route) {
        self.stalled.write().unwrap().insert(route);
    }

    /// Makes the next `count` profile reads report not-found, simulating
    /// readers that raced ahead of a concurrent create.
    pub fn miss_next_reads(&self, count: usize) {
        self.forced_misses.store(count, Ordering::SeqCst);
    }

    /// Analytics events tracked so far.
    pub fn tracked_events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of calls made to `route`.
    pub fn calls_to(&self, route: Route) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| **r == route)
            .count()
    }

    fn take_forced_miss(&self) -> bool {
        self.forced_misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn get_profile(&self, payload: Value) -> Result<Value, RouterError> {
        let lookup: ProfileLookup = serde_json::from_value(payload)?;
        if self.take_forced_miss() {
            return Err(RouterError::NotFound(lookup.user_id.to_string()));
        }
        let profile = self
            .profile(&lookup.user_id)
            .ok_or_else(|| RouterError::NotFound(lookup.user_id.to_string()))?;
        Ok(serde_json::to_value(profile)?)
    }

    fn create_profile(&self, payload: Value) -> Result<Value, RouterError> {
        let profile: UserProfile = serde_json::from_value(payload)?;
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.contains_key(&profile.id) {
            return Err(RouterError::Conflict(profile.id.to_string()));
        }
        // The backend never stores the derived projection.
        let stored = profile.with_ai_context(None);
        profiles.insert(stored.id.clone(), stored.clone());
        Ok(serde_json::to_value(stored)?)
    }

    fn update_profile(&self, payload: Value) -> Result<Value, RouterError> {
        let patch: ProfilePatch = serde_json::from_value(payload)?;
        let mut profiles = self.profiles.lock().unwrap();
        let current = profiles
            .get(&patch.user_id)
            .ok_or_else(|| RouterError::NotFound(patch.user_id.to_string()))?;
        let updated = patch.fields.apply_to(current, self.clock.now());
        profiles.insert(updated.id.clone(), updated.clone());
        Ok(serde_json::to_value(updated)?)
    }

    fn track_event(&self, payload: Value) -> Result<Value, RouterError> {
        let event: AnalyticsEvent = serde_json::from_value(payload)?;
        self.events.lock().unwrap().push(event);
        Ok(json!({ "accepted": true }))
    }
}

#[async_trait]
impl RequestRouter for InMemoryRequestRouter {
    async fn request(&self, route: Route, payload: Value) -> Result<Value, RouterError> {
        self.calls.lock().unwrap().push(route);

        let stalled = self.stalled.read().unwrap().contains(&route);
        if stalled {
            futures::future::pending::<()>().await;
        }

        if let Some(error) = self.failures.read().unwrap().get(&route).cloned() {
            return Err(error);
        }

        match route {
            Route::GetProfile => self.get_profile(payload),
            Route::CreateProfile => self.create_profile(payload),
            Route::UpdateProfile => self.update_profile(payload),
            Route::TrackEvent => self.track_event(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::profile::{ProfileUpdate, SubscriptionTier};

    fn test_profile() -> UserProfile {
        UserProfile::new_default(
            UserId::new("user-123").unwrap(),
            "a@x.com",
            Timestamp::from_unix_secs(1_700_000_000),
        )
    }

    fn lookup() -> Value {
        json!({ "user_id": "user-123" })
    }

    #[tokio::test]
    async fn get_missing_profile_is_not_found() {
        let router = InMemoryRequestRouter::new();
        let result = router.request(Route::GetProfile, lookup()).await;
        assert!(matches!(result, Err(RouterError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_twice_is_conflict() {
        let router = InMemoryRequestRouter::new();
        let payload = serde_json::to_value(test_profile()).unwrap();

        assert!(router.request(Route::CreateProfile, payload.clone()).await.is_ok());
        let second = router.request(Route::CreateProfile, payload).await;

        assert!(matches!(second, Err(RouterError::Conflict(_))));
        assert_eq!(router.profile_count(), 1);
    }

    #[tokio::test]
    async fn update_applies_fields() {
        let router = InMemoryRequestRouter::new().with_profile(test_profile());
        let patch = ProfilePatch {
            user_id: UserId::new("user-123").unwrap(),
            fields: ProfileUpdate::new().with_tier(SubscriptionTier::Premium),
        };

        let value = router
            .request(Route::UpdateProfile, serde_json::to_value(patch).unwrap())
            .await
            .unwrap();

        let updated: UserProfile = serde_json::from_value(value).unwrap();
        assert_eq!(updated.subscription_tier, SubscriptionTier::Premium);
    }

    #[tokio::test]
    async fn forced_misses_are_consumed() {
        let router = InMemoryRequestRouter::new().with_profile(test_profile());
        router.miss_next_reads(1);

        assert!(router.request(Route::GetProfile, lookup()).await.is_err());
        assert!(router.request(Route::GetProfile, lookup()).await.is_ok());
    }

    #[tokio::test]
    async fn injected_failure_applies_to_route_only() {
        let router = InMemoryRequestRouter::new().with_profile(test_profile());
        router.fail_route(Route::TrackEvent, RouterError::Transport("down".to_string()));

        let event = json!({ "event": "sign_in", "properties": {} });
        assert!(router.request(Route::TrackEvent, event).await.is_err());
        assert!(router.request(Route::GetProfile, lookup()).await.is_ok());
        assert_eq!(router.calls_to(Route::TrackEvent), 1);
    }
}
