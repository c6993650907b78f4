//! User profile record and partial updates.

use serde::{Deserialize, Serialize};

use super::{AiContext, Preferences, SubscriptionTier};
use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Profile record kept by the backend for every signed-up user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub onboarding_completed: bool,
    pub created_at: Timestamp,
    pub last_active: Timestamp,
    /// Derived projection; never authoritative on the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_context: Option<AiContext>,
}

impl UserProfile {
    /// Creates the profile a brand-new user starts with: free tier, default
    /// preferences, onboarding not yet completed.
    pub fn new_default(id: UserId, email: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            email: email.into(),
            subscription_tier: SubscriptionTier::Free,
            preferences: Preferences::default(),
            onboarding_completed: false,
            created_at: now,
            last_active: now,
            ai_context: None,
        }
    }

    /// Returns true if the fields the AI context is derived from differ.
    pub fn ai_inputs_differ(&self, other: &UserProfile) -> bool {
        self.subscription_tier != other.subscription_tier || self.preferences != other.preferences
    }

    /// Returns a copy of this profile carrying the given AI context.
    pub fn with_ai_context(mut self, context: Option<AiContext>) -> Self {
        self.ai_context = context;
        self
    }
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<SubscriptionTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.subscription_tier = Some(tier);
        self
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_onboarding_completed(mut self, completed: bool) -> Self {
        self.onboarding_completed = Some(completed);
        self
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.subscription_tier.is_none()
            && self.preferences.is_none()
            && self.onboarding_completed.is_none()
    }

    /// Returns true if the update changes an input of the AI context.
    pub fn touches_ai_context(&self) -> bool {
        self.subscription_tier.is_some() || self.preferences.is_some()
    }

    /// Rejects updates that would be a no-op round trip.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::empty_field("profile_update"));
        }
        Ok(())
    }

    /// Applies the set fields to a profile, stamping `last_active`.
    pub fn apply_to(&self, profile: &UserProfile, now: Timestamp) -> UserProfile {
        let mut updated = profile.clone();
        if let Some(tier) = self.subscription_tier {
            updated.subscription_tier = tier;
        }
        if let Some(preferences) = self.preferences {
            updated.preferences = preferences;
        }
        if let Some(completed) = self.onboarding_completed {
            updated.onboarding_completed = completed;
        }
        updated.last_active = now;
        updated
    }
}
