//! Canonical authentication snapshot and its lifecycle phase.
//!
//! `AuthState` is immutable: every transition builds a new value, and the
//! state machine shares snapshots as `Arc<AuthState>` so consumers can detect
//! change with `Arc::ptr_eq`.

use std::sync::Arc;

use super::{AuthUser, Session};
use crate::domain::foundation::StateMachine;
use crate::domain::profile::{SubscriptionTier, UserProfile};

/// Who is signed in and with what data.
///
/// # Invariants
///
/// - `profile` and `session` are present only if `user` is present.
/// - `initialized` never reverts to false once set.
#[derive(Debug, Clone)]
pub struct AuthState {
    user: Option<AuthUser>,
    profile: Option<Arc<UserProfile>>,
    session: Option<Session>,
    loading: bool,
    error: Option<String>,
    initialized: bool,
}

impl AuthState {
    /// The shape created at process start: loading, not yet resolved.
    pub fn initial() -> Self {
        Self {
            user: None,
            profile: None,
            session: None,
            loading: true,
            error: None,
            initialized: false,
        }
    }

    /// Resolved with nobody signed in.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            profile: None,
            session: None,
            loading: false,
            error: None,
            initialized: true,
        }
    }

    /// Enters resolution for the session's user.
    ///
    /// The current profile is kept only when it belongs to the same user.
    pub fn resolving(&self, session: Session) -> Self {
        let user = session.user.clone();
        let profile = self
            .profile
            .as_ref()
            .filter(|profile| profile.id == user.id)
            .cloned();
        Self {
            user: Some(user),
            profile,
            session: Some(session),
            loading: true,
            error: None,
            initialized: self.initialized,
        }
    }

    /// Completes resolution: published as authenticated and initialized.
    pub fn resolved(&self, profile: Option<Arc<UserProfile>>, error: Option<String>) -> Self {
        Self {
            profile,
            loading: false,
            error,
            initialized: true,
            ..self.clone()
        }
        .normalized()
    }

    /// Replaces only the session; clears any stale error.
    pub fn with_session(&self, session: Session) -> Self {
        Self {
            session: Some(session),
            error: None,
            ..self.clone()
        }
        .normalized()
    }

    /// Replaces only the profile.
    pub fn with_profile(&self, profile: Arc<UserProfile>) -> Self {
        Self {
            profile: Some(profile),
            ..self.clone()
        }
        .normalized()
    }

    /// Replaces the identity record of the current user.
    pub fn with_user(&self, user: AuthUser) -> Self {
        Self {
            user: Some(user),
            ..self.clone()
        }
        .normalized()
    }

    pub fn with_loading(&self, loading: bool) -> Self {
        Self {
            loading,
            ..self.clone()
        }
    }

    pub fn with_error(&self, error: Option<String>) -> Self {
        Self {
            error,
            ..self.clone()
        }
    }

    /// Keeps `initialized` set once `previous` had it set.
    pub fn inherit_initialized(mut self, previous: &AuthState) -> Self {
        self.initialized |= previous.initialized;
        self
    }

    /// Drops any field that would violate the invariants.
    ///
    /// A profile whose id differs from the user's is discarded as well.
    pub fn normalized(mut self) -> Self {
        match &self.user {
            None => {
                self.profile = None;
                self.session = None;
            }
            Some(user) => {
                if self
                    .profile
                    .as_ref()
                    .is_some_and(|profile| profile.id != user.id)
                {
                    self.profile = None;
                }
                if self
                    .session
                    .as_ref()
                    .is_some_and(|session| session.user.id != user.id)
                {
                    self.session = None;
                }
            }
        }
        self
    }

    /// Returns true if the invariants hold.
    pub fn is_consistent(&self) -> bool {
        self.user.is_some() || (self.profile.is_none() && self.session.is_none())
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn profile(&self) -> Option<&Arc<UserProfile>> {
        self.profile.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True iff both a user and a session are present.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.session.is_some()
    }

    /// True iff the profile is absent or onboarding is incomplete.
    pub fn requires_onboarding(&self) -> bool {
        self.profile
            .as_ref()
            .map_or(true, |profile| !profile.onboarding_completed)
    }

    /// Compares the profile's tier rank against `required`.
    ///
    /// Without a profile nothing is granted.
    pub fn has_subscription_at_least(&self, required: SubscriptionTier) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|profile| profile.subscription_tier.is_at_least(required))
    }

    /// Lifecycle phase this snapshot represents.
    pub fn phase(&self) -> AuthPhase {
        match (&self.user, self.loading, self.initialized) {
            (Some(_), true, _) => AuthPhase::Resolving,
            (_, _, false) => AuthPhase::Uninitialized,
            (Some(_), false, true) => AuthPhase::Authenticated,
            (None, _, true) => AuthPhase::Anonymous,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Lifecycle phase derived from a snapshot.
///
/// Errors are not a phase: they ride on top of whichever phase is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPhase {
    Uninitialized,
    Resolving,
    Authenticated,
    Anonymous,
}

impl StateMachine for AuthPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        use AuthPhase::*;
        matches!(
            (self, target),
            (Uninitialized, Uninitialized)
                | (Uninitialized, Resolving)
                | (Uninitialized, Anonymous)
                | (Resolving, Resolving)
                | (Resolving, Authenticated)
                | (Resolving, Anonymous)
                | (Authenticated, Resolving)
                | (Authenticated, Authenticated)
                | (Authenticated, Anonymous)
                | (Anonymous, Resolving)
                | (Anonymous, Anonymous)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use AuthPhase::*;
        match self {
            Uninitialized => vec![Uninitialized, Resolving, Anonymous],
            Resolving => vec![Resolving, Authenticated, Anonymous],
            Authenticated => vec![Resolving, Authenticated, Anonymous],
            Anonymous => vec![Resolving, Anonymous],
        }
    }
}
