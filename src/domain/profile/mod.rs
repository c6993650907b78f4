//! Profile domain - the user's coaching profile and its AI projection.

mod ai_context;
mod preferences;
mod profile;
mod tier;

pub use ai_context::{derive_ai_context, reconcile_ai_context, AiContext};
pub use preferences::{AiPersonality, CommunicationStyle, LearningPace, Preferences};
pub use profile::{ProfileUpdate, UserProfile};
pub use tier::SubscriptionTier;
