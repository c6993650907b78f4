//! Mock identity provider for testing.
//!
//! Implements the `IdentityProvider` port in memory, avoiding the need for a
//! hosted identity service. It mints sessions, emits lifecycle events on
//! every receiver handed out, and can be told to fail.
//!
//! # Example
//!
//! ```ignore
//! use rapport_core::adapters::auth::MockIdentityProvider;
//!
//! let provider = MockIdentityProvider::new().with_account("a@x.com", "pw", "user-123");
//! let events = provider.on_auth_state_change();
//! let session = provider.sign_in_with_password(&credentials).await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::adapters::clock::SystemClock;
use crate::domain::auth::{AuthLifecycleEvent, AuthUser, Credentials, EmailAddress, Session};
use crate::domain::foundation::UserId;
use crate::ports::{
    Clock, IdentityError, IdentityProvider, ResetPasswordOptions, SignUpOptions, SignUpOutcome,
};

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: AuthUser,
}

/// Mock identity provider for testing.
///
/// Stores accounts by email. Unknown emails and wrong passwords return
/// `InvalidCredentials`.
pub struct MockIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<Session>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthLifecycleEvent>>>,
    /// Optional error to return for all calls (for error testing)
    force_error: RwLock<Option<IdentityError>>,
    /// Optional error returned by `sign_out` only
    sign_out_error: RwLock<Option<IdentityError>>,
    reset_requests: Mutex<Vec<(String, String)>>,
    clock: Arc<dyn Clock>,
    session_ttl_secs: i64,
    tokens_minted: AtomicU64,
    refresh_calls: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    /// Creates a provider with no accounts and no session.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            force_error: RwLock::new(None),
            sign_out_error: RwLock::new(None),
            reset_requests: Mutex::new(Vec::new()),
            clock: Arc::new(SystemClock),
            session_ttl_secs: 3600,
            tokens_minted: AtomicU64::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Registers an account that can sign in.
    pub fn with_account(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let email = email.into();
        let user = AuthUser::new(UserId::new(user_id).unwrap(), email.clone());
        self.accounts.write().unwrap().insert(
            email,
            Account {
                password: password.into(),
                user,
            },
        );
        self
    }

    /// Starts with a persisted session, as if the user signed in earlier.
    pub fn with_session(self, session: Session) -> Self {
        *self.session.write().unwrap() = Some(session);
        self
    }

    /// Uses the given clock to stamp session expiries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Lifetime of minted sessions.
    pub fn with_session_ttl_secs(mut self, secs: i64) -> Self {
        self.session_ttl_secs = secs;
        self
    }

    /// Forces all calls to return the specified error.
    pub fn with_error(self, error: IdentityError) -> Self {
        *self.force_error.write().unwrap() = Some(error);
        self
    }

    /// Forces `sign_out` to fail while everything else succeeds.
    pub fn with_sign_out_error(self, error: IdentityError) -> Self {
        *self.sign_out_error.write().unwrap() = Some(error);
        self
    }

    /// Sets the forced error at runtime.
    pub fn set_error(&self, error: IdentityError) {
        *self.force_error.write().unwrap() = Some(error);
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *self.force_error.write().unwrap() = None;
    }

    /// Mints a session for `user` expiring `ttl` seconds from the clock's now.
    pub fn mint_session(&self, user: AuthUser) -> Session {
        let n = self.tokens_minted.fetch_add(1, Ordering::SeqCst);
        Session::new(
            format!("access-{}-{}", user.id, n),
            format!("refresh-{}-{}", user.id, n),
            self.clock.now().plus_secs(self.session_ttl_secs),
            user,
        )
    }

    /// Pushes a lifecycle event to every live receiver.
    pub fn emit(&self, event: AuthLifecycleEvent) {
        tracing::debug!(event = event.name(), "Mock identity provider emitting event");
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Password-reset requests received so far, as `(email, redirect_to)`.
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.reset_requests.lock().unwrap().clone()
    }

    /// Number of `refresh_session` calls made.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Returns the session the provider currently holds.
    pub fn current_session(&self) -> Option<Session> {
        self.session.read().unwrap().clone()
    }

    fn check_forced_error(&self) -> Result<(), IdentityError> {
        match self.force_error.read().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        self.check_forced_error()?;
        Ok(self.current_session())
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, IdentityError> {
        self.check_forced_error()?;
        Ok(self.current_session().map(|session| session.user))
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, IdentityError> {
        self.check_forced_error()?;

        let account = self
            .accounts
            .read()
            .unwrap()
            .get(credentials.email.as_str())
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;

        if account.password != *credentials.password.expose_secret() {
            return Err(IdentityError::InvalidCredentials);
        }

        let session = self.mint_session(account.user);
        *self.session.write().unwrap() = Some(session.clone());
        self.emit(AuthLifecycleEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        _options: &SignUpOptions,
    ) -> Result<SignUpOutcome, IdentityError> {
        self.check_forced_error()?;

        let email = credentials.email.as_str().to_string();
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(&email) {
            return Err(IdentityError::UserAlreadyRegistered);
        }

        let user_id = UserId::new(format!("user-{}", Uuid::new_v4()))
            .map_err(|e| IdentityError::Rejected(e.to_string()))?;
        let user = AuthUser::new(user_id, email.clone());
        accounts.insert(
            email,
            Account {
                password: credentials.password.expose_secret().clone(),
                user: user.clone(),
            },
        );

        Ok(SignUpOutcome {
            user,
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.check_forced_error()?;
        if let Some(error) = self.sign_out_error.read().unwrap().clone() {
            return Err(error);
        }

        *self.session.write().unwrap() = None;
        self.emit(AuthLifecycleEvent::SignedOut);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &EmailAddress,
        options: &ResetPasswordOptions,
    ) -> Result<(), IdentityError> {
        self.check_forced_error()?;
        self.reset_requests
            .lock()
            .unwrap()
            .push((email.as_str().to_string(), options.redirect_to.clone()));
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.check_forced_error()?;

        let user = self
            .current_session()
            .map(|session| session.user)
            .ok_or(IdentityError::SessionMissing)?;
        let session = self.mint_session(user);
        *self.session.write().unwrap() = Some(session.clone());
        self.emit(AuthLifecycleEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn on_auth_state_change(&self) -> mpsc::UnboundedReceiver<AuthLifecycleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials::for_sign_in(email, password).unwrap()
    }

    #[tokio::test]
    async fn sign_in_issues_session_and_emits_event() {
        let provider = MockIdentityProvider::new().with_account("a@x.com", "pw", "user-123");
        let mut events = provider.on_auth_state_change();

        let session = provider
            .sign_in_with_password(&credentials("a@x.com", "pw"))
            .await
            .unwrap();

        assert_eq!(session.user.id.as_str(), "user-123");
        assert!(matches!(events.recv().await, Some(AuthLifecycleEvent::SignedIn(_))));
        assert!(provider.get_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sign_in_rejects_wrong_password() {
        let provider = MockIdentityProvider::new().with_account("a@x.com", "pw", "user-123");

        let result = provider
            .sign_in_with_password(&credentials("a@x.com", "nope"))
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn sign_up_rejects_existing_email() {
        let provider = MockIdentityProvider::new().with_account("a@x.com", "pw", "user-123");
        let options = SignUpOptions {
            email_redirect_to: "https://app.example.com/welcome".to_string(),
        };

        let result = provider.sign_up(&credentials("a@x.com", "password"), &options).await;

        assert!(matches!(result, Err(IdentityError::UserAlreadyRegistered)));
    }

    #[tokio::test]
    async fn sign_up_leaves_confirmation_pending() {
        let provider = MockIdentityProvider::new();
        let options = SignUpOptions {
            email_redirect_to: "https://app.example.com/welcome".to_string(),
        };

        let outcome = provider
            .sign_up(&credentials("new@x.com", "password"), &options)
            .await
            .unwrap();

        assert!(outcome.confirmation_pending());
        assert!(provider.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_error_keeps_session() {
        let provider = MockIdentityProvider::new()
            .with_account("a@x.com", "pw", "user-123")
            .with_sign_out_error(IdentityError::service_unavailable("offline"));
        provider
            .sign_in_with_password(&credentials("a@x.com", "pw"))
            .await
            .unwrap();

        assert!(provider.sign_out().await.is_err());
        assert!(provider.current_session().is_some());
    }

    #[tokio::test]
    async fn refresh_without_session_is_session_missing() {
        let provider = MockIdentityProvider::new();
        assert!(matches!(
            provider.refresh_session().await,
            Err(IdentityError::SessionMissing)
        ));
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn emit_drops_closed_receivers() {
        let provider = MockIdentityProvider::new();
        let closed = provider.on_auth_state_change();
        drop(closed);
        let mut open = provider.on_auth_state_change();

        provider.emit(AuthLifecycleEvent::SignedOut);

        assert!(matches!(open.recv().await, Some(AuthLifecycleEvent::SignedOut)));
        assert_eq!(provider.subscribers.lock().unwrap().len(), 1);
    }
}
