// File: clinicbot-common/src/models/sentiment.rs

use std::collections::BTreeSet;
use std::fmt;
use serde::{Deserialize, Serialize};

/// Reply tone suggested to the response generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    Neutral,
    NeutralInformative,
    EncouragingInformative,
    EmpatheticSupportive,
    EmpatheticUrgent,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::NeutralInformative => "neutral-informative",
            Tone::EncouragingInformative => "encouraging-informative",
            Tone::EmpatheticSupportive => "empathetic-supportive",
            Tone::EmpatheticUrgent => "empathetic-urgent",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation category a keyword belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    /// Presence alone forces a Critical ticket.
    AlwaysEscalate,
    Emergency,
    Distress,
    Treatment,
}

/// Outcome of analysing one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    /// In `[-1, 1]`.
    pub polarity: f64,
    /// In `[0, 1]`.
    pub subjectivity: f64,
    /// In `[0, 1]`.
    pub urgency_score: f64,
    pub matched_keywords: BTreeSet<String>,
    pub suggested_tone: Tone,
    /// True when an always-escalate keyword matched.
    #[serde(default)]
    pub always_escalate: bool,
    /// Computed with a fallback model (no dedicated model for the language).
    #[serde(default)]
    pub degraded: bool,
}

impl SentimentResult {
    /// Result for empty or whitespace-only input.
    pub fn neutral() -> Self {
        Self {
            polarity: 0.0,
            subjectivity: 0.0,
            urgency_score: 0.0,
            matched_keywords: BTreeSet::new(),
            suggested_tone: Tone::Neutral,
            always_escalate: false,
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_tone() -> impl Strategy<Value = Tone> {
        prop_oneof![
            Just(Tone::Neutral),
            Just(Tone::NeutralInformative),
            Just(Tone::EncouragingInformative),
            Just(Tone::EmpatheticSupportive),
            Just(Tone::EmpatheticUrgent),
        ]
    }

    prop_compose! {
        fn any_result()(
            polarity in -1.0f64..=1.0,
            subjectivity in 0.0f64..=1.0,
            urgency_score in 0.0f64..=1.0,
            matched_keywords in prop::collection::btree_set("[a-z ]{1,12}", 0..6),
            suggested_tone in any_tone(),
            always_escalate in any::<bool>(),
            degraded in any::<bool>(),
        ) -> SentimentResult {
            SentimentResult {
                polarity,
                subjectivity,
                urgency_score,
                matched_keywords,
                suggested_tone,
                always_escalate,
                degraded,
            }
        }
    }

    proptest! {
        #[test]
        fn stored_result_reloads_without_drift(original in any_result()) {
            let stored = serde_json::to_string(&original).unwrap();
            let reloaded: SentimentResult = serde_json::from_str(&stored).unwrap();

            prop_assert!((reloaded.polarity - original.polarity).abs() < 1e-6);
            prop_assert!((reloaded.urgency_score - original.urgency_score).abs() < 1e-6);
            prop_assert!((reloaded.subjectivity - original.subjectivity).abs() < 1e-6);
            prop_assert_eq!(reloaded.suggested_tone, original.suggested_tone);
            prop_assert_eq!(reloaded.matched_keywords, original.matched_keywords);
            prop_assert_eq!(reloaded.always_escalate, original.always_escalate);
            prop_assert_eq!(reloaded.degraded, original.degraded);
        }
    }

    #[test]
    fn neutral_result_is_all_zero() {
        let r = SentimentResult::neutral();
        assert_eq!(r.urgency_score, 0.0);
        assert_eq!(r.polarity, 0.0);
        assert_eq!(r.suggested_tone, Tone::Neutral);
        assert!(r.matched_keywords.is_empty());
    }

    #[test]
    fn tone_uses_kebab_labels() {
        let json = serde_json::to_string(&Tone::EmpatheticUrgent).unwrap();
        assert_eq!(json, "\"empathetic-urgent\"");
        assert_eq!(Tone::Neutral.to_string(), "neutral");
    }
}
