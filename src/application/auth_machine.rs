//! AuthStateMachine - the single writer of `AuthState`.
//!
//! Owns the session clock, the realtime bridge, the profile store and the
//! listener registry, and drives them from identity-provider lifecycle events
//! and its own public operations.
//!
//! # Concurrency
//!
//! Lifecycle events, renewal timers and pushed profile changes are funnelled
//! into one driver task and handled one at a time. Public operations take the
//! same transition lock, so state transitions never interleave. Timer and
//! realtime callbacks only enqueue a `Trigger` tagged with the user it was
//! created for; triggers for a user who is no longer current are dropped.
//!
//! Signing out revokes the sessions it ends. Lifecycle events queued before
//! the sign-out that still carry one of those sessions are dropped, so a
//! late `SignedIn` cannot bring the user back.
//!
//! # Example
//!
//! ```ignore
//! let machine = AuthStateMachine::new(deps, config.session.clone());
//! machine.start().await;
//! let _sub = machine.subscribe(|state| render(state));
//! machine.sign_in("a@example.com", "password").await?;
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::analytics::AnalyticsTracker;
use super::listener_registry::{ListenerRegistry, Subscription};
use super::profile_store::ProfileStore;
use super::session_clock::{ArmOutcome, RenewalCallback, SessionClock};
use super::subscription_bridge::{ProfileCallback, SubscriptionBridge};
use crate::config::SessionConfig;
use crate::domain::auth::{
    AuthError, AuthLifecycleEvent, AuthPhase, AuthResult, AuthState, AuthUser, Credentials,
    EmailAddress, Session,
};
use crate::domain::foundation::{StateMachine, UserId};
use crate::domain::profile::{
    derive_ai_context, reconcile_ai_context, AiContext, ProfileUpdate, SubscriptionTier,
    UserProfile,
};
use crate::ports::{
    Clock, IdentityProvider, KeyValueStore, RealtimeTransport, RequestRouter,
    ResetPasswordOptions, SignUpOptions, SignUpOutcome,
};

/// External collaborators of the state machine.
#[derive(Clone)]
pub struct AuthDependencies {
    pub identity: Arc<dyn IdentityProvider>,
    pub router: Arc<dyn RequestRouter>,
    pub realtime: Arc<dyn RealtimeTransport>,
    pub storage: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// Number of revoked sessions remembered for dropping stale events.
const REVOKED_CAPACITY: usize = 16;

/// Work item handled by the driver task.
#[derive(Debug)]
enum Trigger {
    Lifecycle(AuthLifecycleEvent),
    RenewalDue { user_id: UserId },
    ProfilePushed { user_id: UserId, profile: UserProfile },
}

pub struct AuthStateMachine {
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileStore,
    bridge: SubscriptionBridge,
    clock: SessionClock,
    analytics: AnalyticsTracker,
    registry: ListenerRegistry,
    config: SessionConfig,
    transition: tokio::sync::Mutex<()>,
    triggers: mpsc::UnboundedSender<Trigger>,
    pending_triggers: Mutex<Option<mpsc::UnboundedReceiver<Trigger>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    /// Session issued by the last `sign_in` whose `SignedIn` event has not
    /// been handled yet.
    pending_sign_in: Mutex<Option<Session>>,
    revoked: Mutex<VecDeque<Session>>,
}

impl AuthStateMachine {
    /// Builds a machine in the `uninitialized` state.
    ///
    /// Nothing listens to the identity provider until `start` runs: events
    /// emitted before then are not seen, and public operations called before
    /// then change the snapshot but their lifecycle events are never applied.
    pub fn new(deps: AuthDependencies, config: SessionConfig) -> Arc<Self> {
        let (triggers, pending) = mpsc::unbounded_channel();
        Arc::new(Self {
            identity: deps.identity,
            profiles: ProfileStore::new(
                Arc::clone(&deps.router),
                deps.storage,
                Arc::clone(&deps.clock),
                config.ai_context_key_prefix.clone(),
            ),
            bridge: SubscriptionBridge::new(deps.realtime),
            clock: SessionClock::new(deps.clock, config.refresh_margin()),
            analytics: AnalyticsTracker::new(deps.router, config.analytics_enabled),
            registry: ListenerRegistry::new(Arc::new(AuthState::initial())),
            config,
            transition: tokio::sync::Mutex::new(()),
            triggers,
            pending_triggers: Mutex::new(Some(pending)),
            driver: Mutex::new(None),
            pending_sign_in: Mutex::new(None),
            revoked: Mutex::new(VecDeque::new()),
        })
    }

    /// Resolves the persisted session and starts the driver task.
    ///
    /// Never fails: a provider error resolves to anonymous with `error` set.
    /// Calling `start` again only returns the current snapshot.
    ///
    /// The provider subscription is taken here, before the persisted session
    /// is read. Events the provider emitted before this call are lost.
    pub async fn start(self: &Arc<Self>) -> Arc<AuthState> {
        let Some(triggers) = lock(&self.pending_triggers).take() else {
            tracing::warn!("Auth state machine already started");
            return self.state();
        };
        // Subscribe before resolving so no event emitted meanwhile is lost.
        let lifecycle = self.identity.on_auth_state_change();

        let snapshot = self.initialize().await;

        let handle = tokio::spawn(drive(Arc::downgrade(self), lifecycle, triggers));
        *lock(&self.driver) = Some(handle);
        snapshot
    }

    /// Stops the driver, cancels renewal and closes every channel.
    pub async fn shutdown(&self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
        }
        let _guard = self.transition.lock().await;
        self.teardown().await;
        tracing::info!("Auth state machine shut down");
    }

    /// Applies one lifecycle event directly, bypassing the driver queue.
    pub async fn handle_event(&self, event: AuthLifecycleEvent) -> Arc<AuthState> {
        let _guard = self.transition.lock().await;
        self.apply_event(event).await
    }

    // ════════════════════════════════════════════════════════════════════
    // Public operations
    // ════════════════════════════════════════════════════════════════════

    /// Verifies credentials. Profile resolution follows from the provider's
    /// `SignedIn` event; use `wait_for` to observe it.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let _guard = self.transition.lock().await;
        self.begin();

        let result = self.verify_credentials(email, password).await;

        self.analytics.track(
            "sign_in",
            json!({
                "success": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            }),
        );
        self.finish(result)
    }

    /// Requests account creation. Success does not sign the user in while
    /// email confirmation is pending.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let _guard = self.transition.lock().await;
        self.begin();

        let result = self.request_account(email, password).await;

        self.analytics.track(
            "sign_up",
            json!({
                "success": result.is_ok(),
                "confirmation_pending": result
                    .as_ref()
                    .map(SignUpOutcome::confirmation_pending)
                    .unwrap_or(false),
            }),
        );
        self.finish(result)
    }

    /// Signs out. The local session always ends anonymous; a remote failure
    /// is still reported to the caller.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _guard = self.transition.lock().await;
        self.begin();

        let remote = self.identity.sign_out().await;
        if let Err(e) = &remote {
            tracing::warn!("Remote sign-out failed, signing out locally: {}", e);
        }
        self.sign_out_locally().await;

        self.analytics
            .track("sign_out", json!({ "remote_success": remote.is_ok() }));
        remote.map_err(AuthError::from)
    }

    /// Persists a partial profile update and merges the canonical record.
    pub async fn update_profile(&self, update: ProfileUpdate) -> AuthResult<Arc<UserProfile>> {
        let _guard = self.transition.lock().await;
        self.begin();

        let result = self.apply_profile_update(update).await;
        self.finish(result)
    }

    /// Dispatches a password-reset email.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        let _guard = self.transition.lock().await;
        self.begin();

        let result = self.request_password_reset(email).await;
        self.finish(result)
    }

    // ════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> Arc<AuthState> {
        self.registry.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn requires_onboarding(&self) -> bool {
        self.state().requires_onboarding()
    }

    pub fn has_subscription_at_least(&self, tier: SubscriptionTier) -> bool {
        self.state().has_subscription_at_least(tier)
    }

    /// Registers a listener; it is invoked immediately with the current
    /// snapshot.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<AuthState>) + Send + Sync + 'static,
    {
        self.registry.subscribe(listener)
    }

    /// Reads the cached AI context without touching the network.
    pub async fn cached_ai_context(&self, user_id: &UserId) -> Option<AiContext> {
        match self.profiles.load_ai_context(user_id).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Failed to read cached AI context: {}", e);
                None
            }
        }
    }

    /// Waits until a published snapshot satisfies `predicate`.
    ///
    /// Only the latest snapshot is checked, so short-lived intermediate
    /// states may be skipped. Wrap in `tokio::time::timeout` to bound the wait.
    pub async fn wait_for<F>(&self, predicate: F) -> Arc<AuthState>
    where
        F: Fn(&AuthState) -> bool,
    {
        let (tx, mut rx) = watch::channel(self.state());
        let subscription = self.registry.subscribe(move |state| {
            let _ = tx.send(Arc::clone(state));
        });

        let matched = loop {
            let snapshot = Arc::clone(&rx.borrow_and_update());
            if predicate(&snapshot) {
                break snapshot;
            }
            if rx.changed().await.is_err() {
                break self.state();
            }
        };

        subscription.unsubscribe();
        matched
    }

    // ════════════════════════════════════════════════════════════════════
    // Transitions (callers hold the transition lock)
    // ════════════════════════════════════════════════════════════════════

    async fn initialize(&self) -> Arc<AuthState> {
        let _guard = self.transition.lock().await;
        match self.identity.get_session().await {
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user_id(), "Restoring persisted session");
                self.resolve(session).await
            }
            Ok(None) => {
                tracing::info!("No persisted session");
                self.commit(AuthState::anonymous())
            }
            Err(e) => {
                tracing::warn!("Failed to read persisted session: {}", e);
                self.commit(AuthState::anonymous().with_error(Some(AuthError::from(e).to_string())))
            }
        }
    }

    async fn process(&self, trigger: Trigger) {
        let _guard = self.transition.lock().await;
        match trigger {
            Trigger::Lifecycle(event) => {
                self.apply_event(event).await;
            }
            Trigger::RenewalDue { user_id } => {
                self.renew(user_id).await;
            }
            Trigger::ProfilePushed { user_id, profile } => {
                self.apply_pushed_profile(user_id, profile).await;
            }
        }
    }

    async fn apply_event(&self, event: AuthLifecycleEvent) -> Arc<AuthState> {
        tracing::debug!(event = event.name(), "Handling auth lifecycle event");
        if let Some(session) = event.session() {
            if self.is_revoked(session) {
                tracing::debug!(
                    event = event.name(),
                    user_id = %session.user_id(),
                    "Dropping lifecycle event for a signed-out session"
                );
                return self.state();
            }
            self.settle_pending_sign_in(session);
        }
        match event {
            AuthLifecycleEvent::SignedIn(session) => {
                let current = self.state();
                if is_duplicate_sign_in(&current, &session) {
                    return current;
                }
                self.resolve(session).await
            }
            AuthLifecycleEvent::SignedOut => self.sign_out_locally().await,
            AuthLifecycleEvent::TokenRefreshed(session) => {
                self.apply_token_refresh(session, false).await
            }
            AuthLifecycleEvent::UserUpdated(session) => self.apply_user_update(session).await,
        }
    }

    /// Full resolution: profile, AI context, realtime channel, renewal timer.
    async fn resolve(&self, session: Session) -> Arc<AuthState> {
        let previous = self.state();
        let user = session.user.clone();

        // 1. A different user invalidates every resource of the old one
        if let Some(old) = previous.user().filter(|old| old.id != user.id) {
            tracing::info!(from = %old.id, to = %user.id, "Switching signed-in user");
            self.teardown().await;
            self.clear_cached_context(&old.id).await;
        }

        // 2. Announce resolution
        let resolving = self.commit(previous.resolving(session.clone()));
        let known = resolving.profile().map(|profile| profile.as_ref());

        // 3. Profile and AI context; failure degrades to no profile
        let (profile, error) = match self.profiles.fetch_profile(&user).await {
            Ok(fetched) => {
                let profile = self.establish_ai_context(known, fetched).await;
                (Some(Arc::new(profile)), None)
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, "Profile fetch failed, continuing without profile: {}", e);
                (None, Some(e.to_string()))
            }
        };

        // 4. Realtime profile changes
        self.open_profile_channel(&user.id).await;

        // 5. Proactive renewal
        self.arm_renewal(&session);

        tracing::info!(user_id = %user.id, has_profile = profile.is_some(), "Session resolved");
        self.commit(self.state().resolved(profile, error))
    }

    async fn sign_out_locally(&self) -> Arc<AuthState> {
        let current = self.state();
        self.revoke(current.session());
        self.teardown().await;
        if let Some(user) = current.user() {
            self.clear_cached_context(&user.id).await;
        }

        if current.phase() == AuthPhase::Anonymous
            && current.error().is_none()
            && !current.is_loading()
        {
            return current;
        }

        tracing::info!("Signed out");
        self.commit(AuthState::anonymous())
    }

    async fn apply_token_refresh(&self, session: Session, from_renewal: bool) -> Arc<AuthState> {
        let current = self.state();
        let same_user = current
            .user()
            .is_some_and(|user| user.id == *session.user_id());
        if !same_user {
            tracing::info!(user_id = %session.user_id(), "Token refreshed for a user not yet resolved");
            return self.resolve(session).await;
        }

        if current.error().is_none()
            && current
                .session()
                .is_some_and(|existing| existing.same_token_as(&session))
        {
            return current;
        }

        if from_renewal && self.clock.renewal_delay(&session).is_none() {
            // Re-arming would renew again at once, forever.
            tracing::warn!(
                user_id = %session.user_id(),
                "Renewed session already inside refresh margin, not re-arming"
            );
            self.clock.disarm();
        } else {
            self.arm_renewal(&session);
        }

        tracing::debug!(user_id = %session.user_id(), "Session token replaced");
        self.commit(current.with_session(session))
    }

    async fn apply_user_update(&self, session: Option<Session>) -> Arc<AuthState> {
        let current = self.state();
        let Some(user) = current.user().cloned() else {
            tracing::debug!("User update without a signed-in user, ignoring");
            return current;
        };

        let refreshed_user = match session {
            Some(session) if session.user.id == user.id => session.user,
            Some(session) => {
                tracing::warn!(
                    current = %user.id,
                    event = %session.user_id(),
                    "User update for a different user, ignoring"
                );
                return current;
            }
            None => match self.identity.get_user().await {
                Ok(Some(fetched)) if fetched.id == user.id => fetched,
                Ok(_) => user,
                Err(e) => {
                    tracing::warn!(user_id = %user.id, "Failed to read updated user: {}", e);
                    user
                }
            },
        };

        self.commit(current.with_user(refreshed_user.clone()).with_loading(true));

        let known = current.profile().map(|profile| profile.as_ref());
        let next = match self.profiles.fetch_profile(&refreshed_user).await {
            Ok(fetched) => {
                let profile = self.establish_ai_context(known, fetched).await;
                self.state().with_profile(Arc::new(profile))
            }
            Err(e) => {
                tracing::warn!(user_id = %refreshed_user.id, "Profile re-fetch failed, keeping previous profile: {}", e);
                self.state().with_error(Some(e.to_string()))
            }
        };
        self.commit(next.with_loading(false))
    }

    async fn renew(&self, user_id: UserId) -> Arc<AuthState> {
        let current = self.state();
        if current.user().map(|user| &user.id) != Some(&user_id) {
            tracing::debug!(user_id = %user_id, "Dropping renewal for a user no longer signed in");
            return current;
        }

        tracing::info!(user_id = %user_id, "Renewing session token");
        match self.identity.refresh_session().await {
            Ok(session) if session.user_id() == &user_id => {
                self.apply_token_refresh(session, true).await
            }
            Ok(session) => {
                tracing::warn!(
                    expected = %user_id,
                    actual = %session.user_id(),
                    "Renewal returned a session for another user"
                );
                self.resolve(session).await
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Session renewal failed: {}", e);
                self.commit(current.with_error(Some(AuthError::from(e).to_string())))
            }
        }
    }

    async fn apply_pushed_profile(&self, user_id: UserId, profile: UserProfile) -> Arc<AuthState> {
        let current = self.state();
        if current.user().map(|user| &user.id) != Some(&user_id) || profile.id != user_id {
            tracing::debug!(user_id = %user_id, "Dropping profile change for a user no longer signed in");
            return current;
        }

        let known = current.profile().map(|profile| profile.as_ref());
        if let Some(existing) = known {
            if existing.clone().with_ai_context(None) == profile.clone().with_ai_context(None) {
                return current;
            }
        }

        tracing::debug!(user_id = %user_id, "Applying pushed profile change");
        let merged = reconcile_ai_context(known, profile);
        if known.and_then(|p| p.ai_context.as_ref()) != merged.ai_context.as_ref() {
            self.persist_context(&merged).await;
        }
        self.commit(current.with_profile(Arc::new(merged)))
    }

    async fn apply_profile_update(&self, update: ProfileUpdate) -> AuthResult<Arc<UserProfile>> {
        let current = self.state();
        let user_id = current
            .user()
            .map(|user| user.id.clone())
            .ok_or(AuthError::NotAuthenticated)?;
        update.validate()?;

        let canonical = self.profiles.update_profile(&user_id, &update).await?;

        let current = self.state();
        let known_context = current
            .profile()
            .and_then(|profile| profile.ai_context.clone())
            .filter(|context| context.user_id == user_id);
        let merged = match known_context {
            Some(context) if !update.touches_ai_context() => {
                canonical.with_ai_context(Some(context))
            }
            context => {
                let seeded = canonical.with_ai_context(context);
                let derived = derive_ai_context(&seeded);
                let merged = seeded.with_ai_context(Some(derived));
                self.persist_context(&merged).await;
                merged
            }
        };

        tracing::info!(user_id = %user_id, "Profile updated");
        let profile = Arc::new(merged);
        self.commit(current.with_profile(Arc::clone(&profile)));
        Ok(profile)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let credentials = Credentials::for_sign_in(email, password)?;
        let session = self.identity.sign_in_with_password(&credentials).await?;
        tracing::info!(user_id = %session.user_id(), "Credentials verified");
        *lock(&self.pending_sign_in) = Some(session.clone());
        Ok(session.user)
    }

    async fn request_account(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let credentials =
            Credentials::for_sign_up(email, password, self.config.min_password_length)?;
        let options = SignUpOptions {
            email_redirect_to: self.config.email_redirect_url.clone(),
        };
        let outcome = self.identity.sign_up(&credentials, &options).await?;
        tracing::info!(
            user_id = %outcome.user.id,
            confirmation_pending = outcome.confirmation_pending(),
            "Account requested"
        );
        Ok(outcome)
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let email = EmailAddress::parse(email)?;
        let options = ResetPasswordOptions {
            redirect_to: self.config.password_reset_redirect_url.clone(),
        };
        self.identity
            .reset_password_for_email(&email, &options)
            .await?;
        tracing::info!("Password reset email requested");
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════

    /// Publishes a new snapshot, keeping `initialized` sticky.
    fn commit(&self, next: AuthState) -> Arc<AuthState> {
        let previous = self.state();
        let next = next.normalized().inherit_initialized(&previous);

        let (from, to) = (previous.phase(), next.phase());
        if !from.can_transition_to(&to) {
            tracing::warn!(?from, ?to, "Unexpected auth phase transition");
        }

        let snapshot = Arc::new(next);
        tracing::debug!(phase = ?to, loading = snapshot.is_loading(), "Publishing auth state");
        self.registry.publish(Arc::clone(&snapshot));
        snapshot
    }

    fn begin(&self) {
        let current = self.state();
        self.commit(current.with_loading(true).with_error(None));
    }

    fn finish<T>(&self, result: AuthResult<T>) -> AuthResult<T> {
        let current = self.state();
        let next = match &result {
            Ok(_) => current.with_loading(false),
            Err(e) => current.with_loading(false).with_error(Some(e.to_string())),
        };
        self.commit(next);
        result
    }

    /// Revokes `current` and any sign-in still waiting for its event.
    fn revoke(&self, current: Option<&Session>) {
        let pending = lock(&self.pending_sign_in).take();
        let mut revoked = lock(&self.revoked);
        for session in current.cloned().into_iter().chain(pending) {
            if revoked.iter().any(|r| r.same_token_as(&session)) {
                continue;
            }
            if revoked.len() == REVOKED_CAPACITY {
                revoked.pop_front();
            }
            revoked.push_back(session);
        }
    }

    /// Forgets the pending sign-in once its own event arrives.
    fn settle_pending_sign_in(&self, session: &Session) {
        let mut pending = lock(&self.pending_sign_in);
        if pending.as_ref().is_some_and(|p| p.same_token_as(session)) {
            *pending = None;
        }
    }

    fn is_revoked(&self, session: &Session) -> bool {
        lock(&self.revoked)
            .iter()
            .any(|revoked| revoked.same_token_as(session))
    }

    async fn teardown(&self) {
        self.clock.disarm();
        self.bridge.unsubscribe_all().await;
    }

    /// Attaches the AI context: the in-memory one when inputs are unchanged,
    /// otherwise re-derived, seeded from the local cache on cold start.
    async fn establish_ai_context(
        &self,
        known: Option<&UserProfile>,
        mut fetched: UserProfile,
    ) -> UserProfile {
        let known = known.filter(|profile| profile.id == fetched.id);
        if known.is_none() && fetched.ai_context.is_none() {
            fetched.ai_context = self.cached_ai_context(&fetched.id).await;
        }

        let profile = reconcile_ai_context(known, fetched);
        if known.and_then(|p| p.ai_context.as_ref()) != profile.ai_context.as_ref() {
            self.persist_context(&profile).await;
        }
        profile
    }

    async fn persist_context(&self, profile: &UserProfile) {
        let Some(context) = &profile.ai_context else {
            return;
        };
        if let Err(e) = self.profiles.persist_ai_context(context).await {
            tracing::warn!(user_id = %profile.id, "Failed to cache AI context: {}", e);
        }
    }

    async fn clear_cached_context(&self, user_id: &UserId) {
        if let Err(e) = self.profiles.clear_ai_context(user_id).await {
            tracing::warn!(user_id = %user_id, "Failed to clear cached AI context: {}", e);
        }
    }

    async fn open_profile_channel(&self, user_id: &UserId) {
        let triggers = self.triggers.clone();
        let owner = user_id.clone();
        let on_change: ProfileCallback = Arc::new(move |profile| {
            let _ = triggers.send(Trigger::ProfilePushed {
                user_id: owner.clone(),
                profile,
            });
        });

        if let Err(e) = self.bridge.subscribe(user_id, on_change).await {
            tracing::warn!(user_id = %user_id, "Realtime profile channel unavailable: {}", e);
        }
    }

    fn arm_renewal(&self, session: &Session) {
        let triggers = self.triggers.clone();
        let user_id = session.user_id().clone();
        let on_due: RenewalCallback = Arc::new(move || {
            let _ = triggers.send(Trigger::RenewalDue {
                user_id: user_id.clone(),
            });
        });

        if self.clock.arm(session, on_due) == ArmOutcome::Immediate {
            tracing::info!(user_id = %session.user_id(), "Session expires within refresh margin, renewing now");
        }
    }
}

impl Drop for AuthStateMachine {
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
        }
    }
}

/// Driver loop: one trigger at a time until the machine is dropped.
async fn drive(
    machine: Weak<AuthStateMachine>,
    mut lifecycle: mpsc::UnboundedReceiver<AuthLifecycleEvent>,
    mut triggers: mpsc::UnboundedReceiver<Trigger>,
) {
    let mut lifecycle_open = true;
    loop {
        let trigger = tokio::select! {
            event = lifecycle.recv(), if lifecycle_open => match event {
                Some(event) => Trigger::Lifecycle(event),
                None => {
                    tracing::debug!("Identity provider closed its event stream");
                    lifecycle_open = false;
                    continue;
                }
            },
            trigger = triggers.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };

        let Some(machine) = machine.upgrade() else {
            break;
        };
        machine.process(trigger).await;
    }
    tracing::debug!("Auth driver stopped");
}

fn is_duplicate_sign_in(current: &AuthState, session: &Session) -> bool {
    current.phase() == AuthPhase::Authenticated
        && current.error().is_none()
        && current.profile().is_some()
        && current
            .session()
            .is_some_and(|existing| existing.same_token_as(session))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
