//! src/triage/sentiment.rs
//!
//! Sentiment and urgency for one message, plus a conversation-level trend.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use clinicbot_common::models::{LanguageCode, SentimentResult};
use clinicbot_common::traits::{NoopTranslator, Translator};

use super::keywords::KeywordTable;
use super::lexicon::Lexicon;
use super::tone::suggest_tone;
use super::clean_text;

/// Polarity at or above this adds nothing to urgency.
const BOOST_START: f64 = -0.3;
/// Boost reached at polarity -1.
const BOOST_MAX: f64 = 0.4;

/// Extra urgency for strongly negative messages: zero above -0.3, rising
/// linearly to 0.4 at -1.
pub fn polarity_boost(polarity: f64) -> f64 {
    if polarity >= BOOST_START {
        return 0.0;
    }
    let depth = (BOOST_START - polarity.max(-1.0)) / (BOOST_START + 1.0);
    BOOST_MAX * depth
}

pub struct SentimentAnalyzer {
    models: HashMap<LanguageCode, Lexicon>,
    keywords: KeywordTable,
    base_language: LanguageCode,
    translator: Arc<dyn Translator>,
}

impl SentimentAnalyzer {
    /// Built-in lexicons and keyword table. Languages without a lexicon are
    /// translated through `translator` first.
    pub fn new(base_language: LanguageCode, translator: Arc<dyn Translator>) -> Self {
        let models = LanguageCode::ALL
            .iter()
            .filter_map(|lang| Lexicon::for_language(*lang).map(|m| (*lang, m)))
            .collect();
        Self {
            models,
            keywords: KeywordTable::builtin(),
            base_language,
            translator,
        }
    }

    pub fn with_keywords(mut self, keywords: KeywordTable) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_model(mut self, language: LanguageCode, model: Lexicon) -> Self {
        self.models.insert(language, model);
        self
    }

    pub fn has_model(&self, language: LanguageCode) -> bool {
        self.models.contains_key(&language)
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    /// Language whose model scores untranslatable input: the base language
    /// when it has a model, English otherwise.
    fn fallback_language(&self) -> LanguageCode {
        if self.has_model(self.base_language) {
            self.base_language
        } else {
            LanguageCode::En
        }
    }

    pub async fn analyze(&self, text: &str, language: LanguageCode) -> SentimentResult {
        if text.trim().is_empty() {
            return SentimentResult::neutral();
        }

        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return SentimentResult::neutral();
        }

        let (score, degraded) = match self.models.get(&language) {
            Some(model) => (model.score(&cleaned), false),
            None => {
                let target = self.fallback_language();
                let translated = self.translator.translate(&cleaned, language, target).await;
                debug!(
                    "AnalysisDegraded: no model for '{}', scoring with '{}' model (translated={})",
                    language,
                    target,
                    translated.is_some()
                );
                let input = translated.as_deref().unwrap_or(&cleaned);
                let score = self
                    .models
                    .get(&target)
                    .map(|m| m.score(input))
                    .unwrap_or_default();
                (score, true)
            }
        };

        let scan = self.keywords.scan(&cleaned, language);
        let urgency = if scan.always_escalate {
            1.0
        } else {
            (scan.weight_sum + polarity_boost(score.polarity)).clamp(0.0, 1.0)
        };

        SentimentResult {
            polarity: score.polarity,
            subjectivity: score.subjectivity,
            urgency_score: urgency,
            matched_keywords: scan.matched,
            suggested_tone: suggest_tone(score.polarity, urgency),
            always_escalate: scan.always_escalate,
            degraded,
        }
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new(LanguageCode::default(), Arc::new(NoopTranslator))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTrend {
    pub direction: TrendDirection,
    pub average_polarity: f64,
    pub peak_urgency: f64,
    pub has_emergency: bool,
    /// Polarity of each analysed message, oldest first.
    pub progression: Vec<f64>,
}

/// Summarises how a conversation is going. Any message at or above
/// `high_urgency_threshold` marks the whole conversation as an emergency.
pub fn analyze_trend(results: &[SentimentResult], high_urgency_threshold: f64) -> ConversationTrend {
    if results.is_empty() {
        return ConversationTrend {
            direction: TrendDirection::Stable,
            average_polarity: 0.0,
            peak_urgency: 0.0,
            has_emergency: false,
            progression: Vec::new(),
        };
    }

    let progression: Vec<f64> = results.iter().map(|r| r.polarity).collect();
    let average_polarity = progression.iter().sum::<f64>() / progression.len() as f64;
    let peak_urgency = results.iter().map(|r| r.urgency_score).fold(0.0, f64::max);
    let has_emergency = results.iter().any(|r| r.always_escalate || r.urgency_score >= high_urgency_threshold);

    let direction = if has_emergency {
        TrendDirection::Emergency
    } else if average_polarity > 0.1 {
        TrendDirection::Improving
    } else if average_polarity < -0.1 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    ConversationTrend {
        direction,
        average_polarity,
        peak_urgency,
        has_emergency,
        progression,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicbot_common::models::Tone;
    use proptest::prelude::*;

    #[test]
    fn boost_is_zero_above_threshold_and_linear_below() {
        assert_eq!(polarity_boost(0.5), 0.0);
        assert_eq!(polarity_boost(-0.3), 0.0);
        assert!((polarity_boost(-1.0) - 0.4).abs() < 1e-9);
        assert!((polarity_boost(-0.65) - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_text_is_neutral() {
        let analyzer = SentimentAnalyzer::default();
        for text in ["", "   ", "\n\t"] {
            let r = analyzer.analyze(text, LanguageCode::En).await;
            assert_eq!(r.urgency_score, 0.0);
            assert_eq!(r.polarity, 0.0);
            assert_eq!(r.suggested_tone, Tone::Neutral);
            assert!(r.matched_keywords.is_empty());
        }
    }

    #[tokio::test]
    async fn self_harm_is_maximum_urgency() {
        let analyzer = SentimentAnalyzer::default();
        let r = analyzer.analyze("I want to hurt myself", LanguageCode::En).await;
        assert_eq!(r.urgency_score, 1.0);
        assert!(r.always_escalate);
        assert_eq!(r.suggested_tone, Tone::EmpatheticUrgent);
        assert!(!r.degraded);
    }

    #[tokio::test]
    async fn informational_question_is_calm() {
        let analyzer = SentimentAnalyzer::default();
        let r = analyzer.analyze("What are your visiting hours?", LanguageCode::En).await;
        assert!(r.urgency_score < 0.4);
        assert_eq!(r.suggested_tone, Tone::NeutralInformative);
    }

    #[tokio::test]
    async fn urgency_stays_in_bounds() {
        let analyzer = SentimentAnalyzer::default();
        let r = analyzer
            .analyze(
                "EMERGENCY crisis, urgent help, desperate and hopeless, terrible terrible",
                LanguageCode::En,
            )
            .await;
        assert!(r.urgency_score <= 1.0);
        assert!(r.urgency_score >= 0.7);
        assert!(r.polarity >= -1.0);
    }

    #[tokio::test]
    async fn language_without_model_is_degraded() {
        let analyzer = SentimentAnalyzer::default();
        let r = analyzer.analyze("Je veux mourir", LanguageCode::Fr).await;
        assert!(r.degraded);
        assert!(r.always_escalate);
        assert_eq!(r.urgency_score, 1.0);
    }

    #[test]
    fn trend_directions() {
        let mut calm = SentimentResult::neutral();
        calm.polarity = 0.5;
        assert_eq!(analyze_trend(&[calm.clone(), calm.clone()], 0.7).direction, TrendDirection::Improving);

        let mut low = SentimentResult::neutral();
        low.polarity = -0.5;
        assert_eq!(analyze_trend(&[low.clone()], 0.7).direction, TrendDirection::Declining);

        let mut crisis = SentimentResult::neutral();
        crisis.urgency_score = 1.0;
        crisis.always_escalate = true;
        let trend = analyze_trend(&[calm, low, crisis], 0.7);
        assert_eq!(trend.direction, TrendDirection::Emergency);
        assert_eq!(trend.progression.len(), 3);
        assert_eq!(trend.peak_urgency, 1.0);

        assert_eq!(analyze_trend(&[], 0.7).direction, TrendDirection::Stable);
    }

    #[test]
    fn trend_emergency_follows_configured_threshold() {
        let mut worried = SentimentResult::neutral();
        worried.urgency_score = 0.75;
        assert_eq!(analyze_trend(&[worried.clone()], 0.7).direction, TrendDirection::Emergency);
        assert_ne!(analyze_trend(&[worried], 0.8).direction, TrendDirection::Emergency);
    }

    const LOADED_WORDS: &[&str] = &[
        "emergency", "urgent", "crisis", "hopeless", "desperate", "terrible", "pain", "suicide",
        "socorro", "urgente", "morrer", "ayuda", "mourir", "aiuto", "great", "thanks", "NOT", "!!!",
    ];

    fn any_text() -> impl Strategy<Value = String> {
        prop_oneof![
            ".{0,160}",
            prop::collection::vec(prop::sample::select(LOADED_WORDS), 0..24).prop_map(|w| w.join(" ")),
        ]
    }

    proptest! {
        #[test]
        fn scores_stay_in_range(text in any_text(), language in prop::sample::select(LanguageCode::ALL.to_vec())) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let r = rt.block_on(SentimentAnalyzer::default().analyze(&text, language));

            prop_assert!((0.0..=1.0).contains(&r.urgency_score), "urgency {}", r.urgency_score);
            prop_assert!((-1.0..=1.0).contains(&r.polarity), "polarity {}", r.polarity);
            prop_assert!((0.0..=1.0).contains(&r.subjectivity), "subjectivity {}", r.subjectivity);
            if r.always_escalate {
                prop_assert_eq!(r.urgency_score, 1.0);
            }
        }
    }
}
