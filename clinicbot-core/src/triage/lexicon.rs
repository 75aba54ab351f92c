//! src/triage/lexicon.rs
//!
//! Small word-level polarity/subjectivity models. A scored word inherits a
//! flipped, dampened polarity when one of the two preceding tokens is a
//! negator, and an amplified one after an intensifier.

use std::collections::{HashMap, HashSet};

use clinicbot_common::models::LanguageCode;

use super::tokenize;

const NEGATION_FACTOR: f64 = -0.5;
const INTENSIFIER_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordScore {
    pub polarity: f64,
    pub subjectivity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LexiconScore {
    pub polarity: f64,
    pub subjectivity: f64,
    /// Number of lexicon words that contributed.
    pub hits: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: HashMap<String, WordScore>,
    negators: HashSet<String>,
    intensifiers: HashSet<String>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in model for `language`, if one exists.
    pub fn for_language(language: LanguageCode) -> Option<Self> {
        let (words, negators, intensifiers) = match language {
            LanguageCode::En => (EN_WORDS, EN_NEGATORS, EN_INTENSIFIERS),
            LanguageCode::Pt => (PT_WORDS, PT_NEGATORS, PT_INTENSIFIERS),
            LanguageCode::Es => (ES_WORDS, ES_NEGATORS, ES_INTENSIFIERS),
            LanguageCode::Fr | LanguageCode::It => return None,
        };

        let mut lexicon = Self::new();
        for (word, polarity, subjectivity) in words {
            lexicon.add_word(word, *polarity, *subjectivity);
        }
        lexicon.negators = negators.iter().map(|w| w.to_string()).collect();
        lexicon.intensifiers = intensifiers.iter().map(|w| w.to_string()).collect();
        Some(lexicon)
    }

    pub fn add_word(&mut self, word: &str, polarity: f64, subjectivity: f64) {
        self.words.insert(
            word.to_lowercase(),
            WordScore {
                polarity: polarity.clamp(-1.0, 1.0),
                subjectivity: subjectivity.clamp(0.0, 1.0),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Averages the scores of every lexicon word in `text`.
    pub fn score(&self, text: &str) -> LexiconScore {
        let tokens = tokenize(text);
        let mut polarity_sum = 0.0;
        let mut subjectivity_sum = 0.0;
        let mut hits = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let Some(score) = self.words.get(token) else {
                continue;
            };

            let window = &tokens[i.saturating_sub(2)..i];
            let mut polarity = score.polarity;
            let mut subjectivity = score.subjectivity;

            if window.iter().any(|t| self.intensifiers.contains(t)) {
                polarity *= INTENSIFIER_FACTOR;
                subjectivity *= INTENSIFIER_FACTOR;
            }
            if window.iter().any(|t| self.negators.contains(t)) {
                polarity *= NEGATION_FACTOR;
            }

            polarity_sum += polarity.clamp(-1.0, 1.0);
            subjectivity_sum += subjectivity.clamp(0.0, 1.0);
            hits += 1;
        }

        if hits == 0 {
            return LexiconScore::default();
        }

        LexiconScore {
            polarity: (polarity_sum / hits as f64).clamp(-1.0, 1.0),
            subjectivity: (subjectivity_sum / hits as f64).clamp(0.0, 1.0),
            hits,
        }
    }
}

const EN_NEGATORS: &[&str] = &["not", "no", "never", "nothing", "don", "didn", "doesn", "isn", "wasn", "cannot", "nobody"];
const EN_INTENSIFIERS: &[&str] = &["very", "really", "so", "extremely", "too", "totally"];
const EN_WORDS: &[(&str, f64, f64)] = &[
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("happy", 0.8, 1.0),
    ("glad", 0.5, 1.0),
    ("better", 0.5, 0.5),
    ("hope", 0.3, 0.5),
    ("hopeful", 0.6, 0.8),
    ("love", 0.5, 0.6),
    ("excellent", 1.0, 1.0),
    ("helpful", 0.5, 0.5),
    ("calm", 0.3, 0.7),
    ("fine", 0.4, 0.5),
    ("thanks", 0.2, 0.2),
    ("thank", 0.2, 0.2),
    ("grateful", 0.6, 0.8),
    ("motivated", 0.5, 0.7),
    ("confident", 0.5, 0.7),
    ("bad", -0.7, 0.67),
    ("sad", -0.5, 1.0),
    ("terrible", -1.0, 1.0),
    ("awful", -1.0, 1.0),
    ("horrible", -1.0, 1.0),
    ("worst", -1.0, 1.0),
    ("miserable", -0.9, 1.0),
    ("depressed", -0.6, 0.8),
    ("anxious", -0.4, 0.8),
    ("worried", -0.4, 0.7),
    ("scared", -0.6, 0.9),
    ("afraid", -0.6, 0.9),
    ("lonely", -0.5, 0.8),
    ("alone", -0.4, 0.6),
    ("hopeless", -0.8, 0.9),
    ("desperate", -0.7, 0.9),
    ("hurt", -0.6, 0.8),
    ("pain", -0.6, 0.8),
    ("tired", -0.4, 0.7),
    ("angry", -0.6, 1.0),
    ("frustrated", -0.6, 0.9),
    ("stressed", -0.5, 0.8),
    ("nervous", -0.4, 0.8),
];

const PT_NEGATORS: &[&str] = &["não", "nao", "nunca", "nem", "jamais", "nada"];
const PT_INTENSIFIERS: &[&str] = &["muito", "muita", "bastante", "demais", "tão", "tao", "super"];
const PT_WORDS: &[(&str, f64, f64)] = &[
    ("bom", 0.7, 0.6),
    ("boa", 0.7, 0.6),
    ("ótimo", 0.8, 0.75),
    ("otimo", 0.8, 0.75),
    ("feliz", 0.8, 1.0),
    ("melhor", 0.5, 0.5),
    ("esperança", 0.4, 0.6),
    ("esperanca", 0.4, 0.6),
    ("obrigado", 0.3, 0.3),
    ("obrigada", 0.3, 0.3),
    ("grato", 0.5, 0.6),
    ("grata", 0.5, 0.6),
    ("confiante", 0.5, 0.7),
    ("motivado", 0.5, 0.7),
    ("motivada", 0.5, 0.7),
    ("ajudou", 0.4, 0.4),
    ("tranquilo", 0.3, 0.6),
    ("triste", -0.5, 1.0),
    ("deprimido", -0.6, 0.8),
    ("deprimida", -0.6, 0.8),
    ("ansioso", -0.4, 0.8),
    ("ansiosa", -0.4, 0.8),
    ("preocupado", -0.4, 0.7),
    ("preocupada", -0.4, 0.7),
    ("medo", -0.6, 0.9),
    ("nervoso", -0.4, 0.8),
    ("nervosa", -0.4, 0.8),
    ("estressado", -0.5, 0.8),
    ("estressada", -0.5, 0.8),
    ("cansado", -0.4, 0.7),
    ("cansada", -0.4, 0.7),
    ("frustrado", -0.6, 0.9),
    ("frustrada", -0.6, 0.9),
    ("sozinho", -0.4, 0.6),
    ("sozinha", -0.4, 0.6),
    ("desesperado", -0.7, 0.9),
    ("desesperada", -0.7, 0.9),
    ("desespero", -0.7, 0.9),
    ("péssimo", -1.0, 1.0),
    ("pessimo", -1.0, 1.0),
    ("ruim", -0.7, 0.67),
    ("horrível", -1.0, 1.0),
    ("horrivel", -1.0, 1.0),
    ("dor", -0.6, 0.8),
    ("aguento", 0.2, 0.3),
];

const ES_NEGATORS: &[&str] = &["no", "nunca", "jamás", "jamas", "ni", "nada"];
const ES_INTENSIFIERS: &[&str] = &["muy", "tan", "bastante", "demasiado", "súper"];
const ES_WORDS: &[(&str, f64, f64)] = &[
    ("bueno", 0.7, 0.6),
    ("buena", 0.7, 0.6),
    ("feliz", 0.8, 1.0),
    ("mejor", 0.5, 0.5),
    ("esperanza", 0.4, 0.6),
    ("gracias", 0.3, 0.3),
    ("excelente", 1.0, 1.0),
    ("genial", 0.8, 0.8),
    ("agradecido", 0.5, 0.6),
    ("agradecida", 0.5, 0.6),
    ("tranquilo", 0.3, 0.6),
    ("triste", -0.5, 1.0),
    ("deprimido", -0.6, 0.8),
    ("deprimida", -0.6, 0.8),
    ("ansioso", -0.4, 0.8),
    ("ansiosa", -0.4, 0.8),
    ("preocupado", -0.4, 0.7),
    ("preocupada", -0.4, 0.7),
    ("miedo", -0.6, 0.9),
    ("nervioso", -0.4, 0.8),
    ("nerviosa", -0.4, 0.8),
    ("cansado", -0.4, 0.7),
    ("cansada", -0.4, 0.7),
    ("desesperado", -0.7, 0.9),
    ("desesperada", -0.7, 0.9),
    ("terrible", -1.0, 1.0),
    ("malo", -0.7, 0.67),
    ("mala", -0.7, 0.67),
    ("horrible", -1.0, 1.0),
    ("dolor", -0.6, 0.8),
    ("aguanto", 0.2, 0.3),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> Lexicon {
        Lexicon::for_language(LanguageCode::En).unwrap()
    }

    #[test]
    fn dedicated_models_exist_for_pt_en_es_only() {
        assert!(Lexicon::for_language(LanguageCode::Pt).is_some());
        assert!(Lexicon::for_language(LanguageCode::En).is_some());
        assert!(Lexicon::for_language(LanguageCode::Es).is_some());
        assert!(Lexicon::for_language(LanguageCode::Fr).is_none());
        assert!(Lexicon::for_language(LanguageCode::It).is_none());
    }

    #[test]
    fn no_hits_is_neutral() {
        let s = en().score("What are your visiting hours?");
        assert_eq!(s, LexiconScore::default());
    }

    #[test]
    fn negation_flips_and_dampens() {
        let plain = en().score("I feel good");
        let negated = en().score("I do not feel good");
        assert!(plain.polarity > 0.0);
        assert!(negated.polarity < 0.0);
        assert!(negated.polarity.abs() < plain.polarity.abs());
    }

    #[test]
    fn intensifier_amplifies_within_bounds() {
        let plain = en().score("I am sad");
        let strong = en().score("I am very sad");
        assert!(strong.polarity < plain.polarity);
        assert!(strong.polarity >= -1.0);
        let capped = en().score("really terrible");
        assert_eq!(capped.polarity, -1.0);
    }

    #[test]
    fn portuguese_negated_endurance_reads_negative() {
        let pt = Lexicon::for_language(LanguageCode::Pt).unwrap();
        let s = pt.score("Estou desesperado, não aguento mais");
        assert!(s.polarity < -0.3, "polarity was {}", s.polarity);
    }
}
