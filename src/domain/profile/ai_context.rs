//! AI context projection of a user profile.
//!
//! The context personalises AI-driven coaching. It is a pure function of the
//! profile; writing it to local storage is the caller's job.

use serde::{Deserialize, Serialize};

use super::{Preferences, SubscriptionTier, UserProfile};
use crate::domain::foundation::UserId;

/// Personalisation data handed to AI features and cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiContext {
    pub user_id: UserId,
    pub subscription_tier: SubscriptionTier,
    pub preferences: Preferences,
    #[serde(default)]
    pub learning_history: Vec<String>,
    #[serde(default)]
    pub current_goals: Vec<String>,
}

/// Derives a fresh AI context from a profile.
///
/// Learning history and goals accumulate over time, so they are carried over
/// from the profile's previous context when one exists.
pub fn derive_ai_context(profile: &UserProfile) -> AiContext {
    let (learning_history, current_goals) = match &profile.ai_context {
        Some(previous) if previous.user_id == profile.id => (
            previous.learning_history.clone(),
            previous.current_goals.clone(),
        ),
        _ => (Vec::new(), Vec::new()),
    };

    AiContext {
        user_id: profile.id.clone(),
        subscription_tier: profile.subscription_tier,
        preferences: profile.preferences,
        learning_history,
        current_goals,
    }
}

/// Returns the profile with its AI context refreshed when `previous` is absent
/// or differs in tier or preferences; otherwise keeps the previous context.
pub fn reconcile_ai_context(previous: Option<&UserProfile>, next: UserProfile) -> UserProfile {
    let previous = previous.filter(|prev| prev.id == next.id);
    if let Some(prev) = previous {
        if prev.ai_context.is_some() && !prev.ai_inputs_differ(&next) {
            return next.with_ai_context(prev.ai_context.clone());
        }
    }

    let mut seeded = next;
    if seeded.ai_context.is_none() {
        seeded.ai_context = previous.and_then(|prev| prev.ai_context.clone());
    }
    let context = derive_ai_context(&seeded);
    seeded.with_ai_context(Some(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::profile::CommunicationStyle;

    fn test_profile() -> UserProfile {
        UserProfile::new_default(
            UserId::new("user-123").unwrap(),
            "a@x.com",
            Timestamp::from_unix_secs(1_700_000_000),
        )
    }

    #[test]
    fn derive_copies_tier_and_preferences() {
        let mut profile = test_profile();
        profile.subscription_tier = SubscriptionTier::Premium;

        let context = derive_ai_context(&profile);

        assert_eq!(context.user_id, profile.id);
        assert_eq!(context.subscription_tier, SubscriptionTier::Premium);
        assert_eq!(context.preferences, profile.preferences);
        assert!(context.learning_history.is_empty());
        assert!(context.current_goals.is_empty());
    }

    #[test]
    fn derive_does_not_mutate_profile() {
        let profile = test_profile();
        let before = profile.clone();
        let _ = derive_ai_context(&profile);
        assert_eq!(profile, before);
    }

    #[test]
    fn derive_carries_history_and_goals_forward() {
        let mut profile = test_profile();
        let mut context = derive_ai_context(&profile);
        context.learning_history.push("active-listening".to_string());
        context.current_goals.push("weekly check-in".to_string());
        profile.ai_context = Some(context);
        profile.subscription_tier = SubscriptionTier::Professional;

        let refreshed = derive_ai_context(&profile);

        assert_eq!(refreshed.subscription_tier, SubscriptionTier::Professional);
        assert_eq!(refreshed.learning_history, vec!["active-listening"]);
        assert_eq!(refreshed.current_goals, vec!["weekly check-in"]);
    }

    #[test]
    fn reconcile_keeps_context_when_inputs_unchanged() {
        let previous = reconcile_ai_context(None, test_profile());
        let mut next = test_profile();
        next.onboarding_completed = true;

        let merged = reconcile_ai_context(Some(&previous), next);

        assert_eq!(merged.ai_context, previous.ai_context);
        assert!(merged.onboarding_completed);
    }

    #[test]
    fn reconcile_recomputes_when_preferences_change() {
        let previous = reconcile_ai_context(None, test_profile());
        let mut next = test_profile();
        next.preferences.communication_style = CommunicationStyle::Direct;

        let merged = reconcile_ai_context(Some(&previous), next);

        let context = merged.ai_context.unwrap();
        assert_eq!(
            context.preferences.communication_style,
            CommunicationStyle::Direct
        );
    }
}
