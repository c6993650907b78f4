//! ProfileStore - fetch-or-create of user profiles, profile updates, and the
//! local AI context cache.
//!
//! Profiles live behind the request router. The AI context is a local
//! projection kept in the key/value store so it survives restarts.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::auth::{AuthError, AuthUser};
use crate::domain::foundation::UserId;
use crate::domain::profile::{AiContext, ProfileUpdate, UserProfile};
use crate::ports::{
    Clock, KeyValueStore, ProfileLookup, ProfilePatch, RequestRouter, Route, RouterError,
};

pub struct ProfileStore {
    router: Arc<dyn RequestRouter>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
}

impl ProfileStore {
    pub fn new(
        router: Arc<dyn RequestRouter>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            router,
            storage,
            clock,
            key_prefix: key_prefix.into(),
        }
    }

    /// Returns the user's profile, creating a default one if none exists.
    ///
    /// Safe to call concurrently for the same user: when two callers both
    /// see not-found, the create that loses the race re-reads the winner's
    /// record instead of failing.
    ///
    /// # Errors
    ///
    /// - `RemoteFailure` if a routed call fails for any reason other than
    ///   not-found on read or duplicate on create
    /// - `ProfileConflict` if create reports a duplicate but the record still
    ///   cannot be read
    pub async fn fetch_profile(&self, user: &AuthUser) -> Result<UserProfile, AuthError> {
        // 1. Read the stored record
        if let Some(profile) = self.read(&user.id).await? {
            return Ok(profile);
        }

        // 2. Create a default record
        let fresh = UserProfile::new_default(user.id.clone(), &user.email, self.clock.now());
        let payload = serde_json::to_value(&fresh).map_err(RouterError::from)?;
        match self.router.request(Route::CreateProfile, payload).await {
            Ok(created) => {
                tracing::info!(user_id = %user.id, "Created default profile");
                decode_profile(created)
            }
            // 3. Someone else created it first; theirs is canonical
            Err(RouterError::Conflict(_)) => {
                tracing::debug!(user_id = %user.id, "Profile created concurrently, re-reading");
                self.read(&user.id)
                    .await?
                    .ok_or_else(|| AuthError::ProfileConflict(user.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies a partial update and returns the canonical record.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, AuthError> {
        update.validate()?;

        let patch = ProfilePatch {
            user_id: user_id.clone(),
            fields: update.clone(),
        };
        let payload = serde_json::to_value(&patch).map_err(RouterError::from)?;
        let updated = self.router.request(Route::UpdateProfile, payload).await?;
        decode_profile(updated)
    }

    /// Writes the AI context to the local cache.
    pub async fn persist_ai_context(&self, context: &AiContext) -> Result<(), AuthError> {
        let value = serde_json::to_string(context).map_err(RouterError::from)?;
        self.storage
            .set_item(&self.ai_context_key(&context.user_id), &value)
            .await?;
        Ok(())
    }

    /// Reads the cached AI context.
    ///
    /// A cache entry that no longer parses, or that belongs to another user,
    /// is treated as absent.
    pub async fn load_ai_context(&self, user_id: &UserId) -> Result<Option<AiContext>, AuthError> {
        let Some(raw) = self.storage.get_item(&self.ai_context_key(user_id)).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<AiContext>(&raw) {
            Ok(context) if &context.user_id == user_id => Ok(Some(context)),
            Ok(_) => {
                tracing::warn!(user_id = %user_id, "Cached AI context belongs to another user");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Discarding unreadable AI context: {}", e);
                Ok(None)
            }
        }
    }

    /// Removes the cached AI context. Removing a missing entry succeeds.
    pub async fn clear_ai_context(&self, user_id: &UserId) -> Result<(), AuthError> {
        self.storage
            .remove_item(&self.ai_context_key(user_id))
            .await?;
        Ok(())
    }

    fn ai_context_key(&self, user_id: &UserId) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    async fn read(&self, user_id: &UserId) -> Result<Option<UserProfile>, AuthError> {
        let lookup = ProfileLookup {
            user_id: user_id.clone(),
        };
        let payload = serde_json::to_value(&lookup).map_err(RouterError::from)?;
        match self.router.request(Route::GetProfile, payload).await {
            Ok(value) => decode_profile(value).map(Some),
            Err(RouterError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn decode_profile(value: Value) -> Result<UserProfile, AuthError> {
    Ok(serde_json::from_value(value).map_err(RouterError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;
    use crate::adapters::router::InMemoryRequestRouter;
    use crate::adapters::storage::InMemoryKeyValueStore;
    use crate::domain::foundation::{Timestamp, ValidationError};
    use crate::domain::profile::{derive_ai_context, SubscriptionTier};

    struct Fixture {
        router: Arc<InMemoryRequestRouter>,
        storage: Arc<InMemoryKeyValueStore>,
        store: ProfileStore,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Timestamp::from_unix_secs(1_700_000_000)));
        let router = Arc::new(InMemoryRequestRouter::new().with_clock(clock.clone()));
        let storage = Arc::new(InMemoryKeyValueStore::new());
        let store = ProfileStore::new(router.clone(), storage.clone(), clock, "ai_context:");
        Fixture {
            router,
            storage,
            store,
        }
    }

    fn user(id: &str) -> AuthUser {
        AuthUser::new(UserId::new(id).unwrap(), format!("{}@example.com", id))
    }

    #[tokio::test]
    async fn fetch_returns_existing_profile() {
        let f = fixture();
        let existing = UserProfile::new_default(
            UserId::new("alice").unwrap(),
            "alice@example.com",
            Timestamp::from_unix_secs(1_600_000_000),
        );
        f.router.insert_profile(existing.clone());

        let fetched = f.store.fetch_profile(&user("alice")).await.unwrap();

        assert_eq!(fetched, existing);
        assert_eq!(f.router.calls_to(Route::CreateProfile), 0);
    }

    #[tokio::test]
    async fn fetch_creates_default_when_missing() {
        let f = fixture();

        let fetched = f.store.fetch_profile(&user("bob")).await.unwrap();

        assert_eq!(fetched.subscription_tier, SubscriptionTier::Free);
        assert!(!fetched.onboarding_completed);
        assert_eq!(fetched.email, "bob@example.com");
        assert_eq!(f.router.profile_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_fetches_converge_on_one_record() {
        let f = fixture();
        // Both readers see not-found before either create lands.
        f.router.miss_next_reads(2);
        let who = user("carol");

        let (a, b) = tokio::join!(f.store.fetch_profile(&who), f.store.fetch_profile(&who));

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(f.router.profile_count(), 1);
        assert_eq!(f.router.calls_to(Route::CreateProfile), 2);
    }

    #[tokio::test]
    async fn conflict_without_readable_record_is_profile_conflict() {
        let f = fixture();
        f.router
            .fail_route(Route::CreateProfile, RouterError::Conflict("dave".into()));

        let result = f.store.fetch_profile(&user("dave")).await;

        assert!(matches!(result, Err(AuthError::ProfileConflict(id)) if id.as_str() == "dave"));
    }

    #[tokio::test]
    async fn read_failure_is_remote_failure() {
        let f = fixture();
        f.router
            .fail_route(Route::GetProfile, RouterError::Transport("offline".into()));

        let result = f.store.fetch_profile(&user("erin")).await;

        assert!(matches!(result, Err(AuthError::RemoteFailure(_))));
        assert_eq!(f.router.calls_to(Route::CreateProfile), 0);
    }

    #[tokio::test]
    async fn update_returns_canonical_record() {
        let f = fixture();
        f.store.fetch_profile(&user("frank")).await.unwrap();

        let updated = f
            .store
            .update_profile(
                &UserId::new("frank").unwrap(),
                &ProfileUpdate::new().with_tier(SubscriptionTier::Premium),
            )
            .await
            .unwrap();

        assert_eq!(updated.subscription_tier, SubscriptionTier::Premium);
        assert_eq!(
            f.router
                .profile(&UserId::new("frank").unwrap())
                .unwrap()
                .subscription_tier,
            SubscriptionTier::Premium
        );
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_any_call() {
        let f = fixture();

        let result = f
            .store
            .update_profile(&UserId::new("gina").unwrap(), &ProfileUpdate::new())
            .await;

        assert!(matches!(
            result,
            Err(AuthError::ValidationFailure(ValidationError::EmptyField { .. }))
        ));
        assert_eq!(f.router.calls_to(Route::UpdateProfile), 0);
    }

    #[tokio::test]
    async fn ai_context_cache_round_trip_and_clear() {
        let f = fixture();
        let profile = f.store.fetch_profile(&user("hana")).await.unwrap();
        let context = derive_ai_context(&profile);

        f.store.persist_ai_context(&context).await.unwrap();
        assert!(f.storage.contains("ai_context:hana"));
        assert_eq!(
            f.store.load_ai_context(&profile.id).await.unwrap(),
            Some(context)
        );

        f.store.clear_ai_context(&profile.id).await.unwrap();
        assert_eq!(f.store.load_ai_context(&profile.id).await.unwrap(), None);
        // Clearing twice is fine.
        f.store.clear_ai_context(&profile.id).await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_cache_entry_is_absent() {
        let f = fixture();
        f.storage
            .set_item("ai_context:ivan", "{not json")
            .await
            .unwrap();

        let loaded = f
            .store
            .load_ai_context(&UserId::new("ivan").unwrap())
            .await
            .unwrap();

        assert_eq!(loaded, None);
    }
}
