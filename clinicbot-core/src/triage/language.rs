//! src/triage/language.rs
//!
//! Stopword/marker scoring over the five supported languages.

use std::collections::HashMap;

use clinicbot_common::models::LanguageCode;

use super::tokenize;

/// Best language must hold at least this share of the total score.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

pub const DEFAULT_MIN_CHARS: usize = 8;

const PT_WORDS: &[&str] = &[
    "o", "os", "as", "do", "da", "dos", "das", "que", "não", "nao", "é", "eu", "você", "voce",
    "meu", "minha", "com", "para", "por", "um", "uma", "quero", "estou", "tem", "qual", "quais",
    "ajuda", "obrigado", "obrigada", "está", "esta", "muito", "isso", "mais", "mas", "aguento",
    "preciso", "olá", "ola", "bom", "dia", "horário", "horario", "visita", "filho", "filha",
    "vocês", "voces", "também", "então", "ele", "ela", "ao", "na", "no",
];

const EN_WORDS: &[&str] = &[
    "the", "and", "is", "are", "you", "your", "what", "how", "i", "my", "me", "to", "of", "want",
    "do", "have", "this", "it", "for", "with", "please", "hours", "myself", "help", "need", "not",
    "am", "can", "hello", "hi", "thanks", "thank", "visiting", "when", "where", "be", "will",
    "son", "daughter", "would", "like", "about", "there", "that", "from",
];

const ES_WORDS: &[&str] = &[
    "el", "los", "las", "que", "y", "es", "yo", "usted", "mi", "con", "para", "por", "un", "una",
    "quiero", "estoy", "tiene", "cómo", "cuál", "cual", "ayuda", "gracias", "está", "muy", "eso",
    "hola", "necesito", "pero", "más", "hijo", "hija", "horario", "visitas", "puedo", "ustedes",
    "también", "tengo", "aguanto", "del", "al", "no",
];

const FR_WORDS: &[&str] = &[
    "le", "la", "les", "des", "et", "est", "je", "vous", "mon", "ma", "avec", "pour", "une",
    "veux", "suis", "ai", "comment", "quel", "quelle", "aide", "merci", "pas", "ne", "bonjour",
    "besoin", "peux", "très", "mais", "c", "j", "d", "l", "qu", "fils", "fille", "heures",
    "sont", "nous", "du", "au", "en",
];

const IT_WORDS: &[&str] = &[
    "il", "lo", "gli", "di", "che", "e", "è", "io", "lei", "mio", "mia", "per", "voglio", "sono",
    "ho", "come", "quale", "aiuto", "grazie", "non", "ciao", "bisogno", "molto", "ma", "figlio",
    "figlia", "orari", "posso", "anche", "della", "del", "questo", "buongiorno", "faccio",
];

/// Characters that only (or almost only) occur in one of the languages.
const MARKERS: &[(char, LanguageCode)] = &[
    ('ã', LanguageCode::Pt),
    ('õ', LanguageCode::Pt),
    ('ç', LanguageCode::Pt),
    ('ñ', LanguageCode::Es),
    ('¿', LanguageCode::Es),
    ('¡', LanguageCode::Es),
    ('œ', LanguageCode::Fr),
    ('ù', LanguageCode::Fr),
    ('û', LanguageCode::Fr),
    ('ì', LanguageCode::It),
    ('ò', LanguageCode::It),
];

fn stopwords(language: LanguageCode) -> &'static [&'static str] {
    match language {
        LanguageCode::Pt => PT_WORDS,
        LanguageCode::En => EN_WORDS,
        LanguageCode::Es => ES_WORDS,
        LanguageCode::Fr => FR_WORDS,
        LanguageCode::It => IT_WORDS,
    }
}

#[derive(Debug, Clone)]
pub struct LanguageDetector {
    base_language: LanguageCode,
    min_chars: usize,
    /// token -> languages that list it
    index: HashMap<&'static str, Vec<LanguageCode>>,
}

impl LanguageDetector {
    pub fn new(base_language: LanguageCode, min_chars: usize) -> Self {
        let mut index: HashMap<&'static str, Vec<LanguageCode>> = HashMap::new();
        for lang in LanguageCode::ALL {
            for word in stopwords(lang) {
                let entry = index.entry(*word).or_default();
                if !entry.contains(&lang) {
                    entry.push(lang);
                }
            }
        }
        Self {
            base_language,
            min_chars,
            index,
        }
    }

    pub fn base_language(&self) -> LanguageCode {
        self.base_language
    }

    /// Never fails: short or ambiguous text maps to the base language.
    pub fn detect(&self, text: &str) -> LanguageCode {
        self.classify(text).unwrap_or(self.base_language)
    }

    /// The language only when the text is long enough and one language
    /// clearly dominates.
    pub fn classify(&self, text: &str) -> Option<LanguageCode> {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return None;
        }

        let scores = self.scores(trimmed);
        let total: f64 = scores.values().sum();
        if total <= 0.0 {
            return None;
        }

        let (best, best_score) = scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(lang, score)| (*lang, *score))?;

        // An even split between two languages is ambiguous.
        let confidence = best_score / total;
        let tied = scores.iter().any(|(lang, s)| *lang != best && (*s - best_score).abs() < f64::EPSILON);
        if confidence >= CONFIDENCE_THRESHOLD && !tied {
            Some(best)
        } else {
            None
        }
    }

    fn scores(&self, text: &str) -> HashMap<LanguageCode, f64> {
        let mut scores: HashMap<LanguageCode, f64> = HashMap::new();

        for token in tokenize(text) {
            if let Some(langs) = self.index.get(token.as_str()) {
                let share = 1.0 / langs.len() as f64;
                for lang in langs {
                    *scores.entry(*lang).or_insert(0.0) += share;
                }
            }
        }

        let lowered = text.to_lowercase();
        for (marker, lang) in MARKERS {
            if lowered.contains(*marker) {
                *scores.entry(*lang).or_insert(0.0) += 1.0;
            }
        }

        scores
    }
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(LanguageCode::default(), DEFAULT_MIN_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_supported_language() {
        let d = LanguageDetector::default();
        assert_eq!(d.detect("What are your visiting hours?"), LanguageCode::En);
        assert_eq!(d.detect("Estou desesperado, não aguento mais"), LanguageCode::Pt);
        assert_eq!(d.detect("Hola, necesito ayuda con mi hijo"), LanguageCode::Es);
        assert_eq!(d.detect("Bonjour, j'ai besoin d'aide pour mon fils"), LanguageCode::Fr);
        assert_eq!(d.detect("Ciao, ho bisogno di aiuto per mio figlio"), LanguageCode::It);
    }

    #[test]
    fn short_text_falls_back_to_base() {
        let d = LanguageDetector::new(LanguageCode::Pt, 8);
        assert_eq!(d.classify("ok"), None);
        assert_eq!(d.detect("thanks"), LanguageCode::Pt);
    }

    #[test]
    fn unrecognised_text_is_unclassified() {
        let d = LanguageDetector::new(LanguageCode::En, 8);
        assert_eq!(d.classify("xyzzy plugh qwerty"), None);
        assert_eq!(d.detect("xyzzy plugh qwerty"), LanguageCode::En);
    }

    #[test]
    fn base_language_is_configurable() {
        let d = LanguageDetector::new(LanguageCode::Es, 3);
        assert_eq!(d.base_language(), LanguageCode::Es);
        assert_eq!(d.detect("??"), LanguageCode::Es);
    }
}
