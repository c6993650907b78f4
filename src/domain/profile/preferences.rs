//! Coaching preferences chosen during onboarding.

use serde::{Deserialize, Serialize};

/// How coaching content should be phrased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Gentle,
    #[default]
    Balanced,
    Direct,
}

/// Persona the AI coach adopts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiPersonality {
    #[default]
    Empathetic,
    Analytical,
    Motivational,
}

/// How quickly new material is introduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningPace {
    Relaxed,
    #[default]
    Moderate,
    Intensive,
}

/// Preference set stored on the profile and mirrored into the AI context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub communication_style: CommunicationStyle,
    #[serde(default)]
    pub ai_personality: AiPersonality,
    #[serde(default)]
    pub learning_pace: LearningPace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preferences_are_balanced_empathetic_moderate() {
        let prefs = Preferences::default();
        assert_eq!(prefs.communication_style, CommunicationStyle::Balanced);
        assert_eq!(prefs.ai_personality, AiPersonality::Empathetic);
        assert_eq!(prefs.learning_pace, LearningPace::Moderate);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"communication_style":"direct"}"#).unwrap();
        assert_eq!(prefs.communication_style, CommunicationStyle::Direct);
        assert_eq!(prefs.learning_pace, LearningPace::Moderate);
    }
}
