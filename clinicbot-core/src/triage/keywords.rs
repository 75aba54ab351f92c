//! src/triage/keywords.rs
//!
//! Escalation keywords as data: language -> term -> (weight, category).
//! Terms are matched on whole words after the same tokenization applied to
//! the message, so multi-word phrases work and accents must match.

use std::collections::{BTreeSet, HashMap};

use clinicbot_common::models::{KeywordCategory, LanguageCode};

use super::match_surface;

/// Default weight contributed to the urgency score by one matched term.
pub fn category_weight(category: KeywordCategory) -> f64 {
    match category {
        KeywordCategory::AlwaysEscalate => 1.0,
        KeywordCategory::Emergency => 0.45,
        KeywordCategory::Distress => 0.25,
        KeywordCategory::Treatment => 0.1,
    }
}

use KeywordCategory::{AlwaysEscalate as AE, Distress as DI, Emergency as EM, Treatment as TR};
use LanguageCode::{En, Es, Fr, It, Pt};

const BUILTIN: &[(LanguageCode, KeywordCategory, &str)] = &[
    // pt
    (Pt, AE, "suicídio"),
    (Pt, AE, "suicidio"),
    (Pt, AE, "me matar"),
    (Pt, AE, "me machucar"),
    (Pt, AE, "quero morrer"),
    (Pt, AE, "acabar com tudo"),
    (Pt, AE, "tirar minha vida"),
    (Pt, AE, "overdose"),
    (Pt, EM, "emergência"),
    (Pt, EM, "emergencia"),
    (Pt, EM, "crise"),
    (Pt, EM, "urgente"),
    (Pt, EM, "socorro"),
    (Pt, EM, "imediatamente"),
    (Pt, EM, "intoxicação"),
    (Pt, EM, "intoxicacao"),
    (Pt, DI, "desespero"),
    (Pt, DI, "desesperado"),
    (Pt, DI, "desesperada"),
    (Pt, DI, "não aguento mais"),
    (Pt, DI, "nao aguento mais"),
    (Pt, DI, "sem saída"),
    (Pt, DI, "pânico"),
    (Pt, TR, "internação"),
    (Pt, TR, "internacao"),
    (Pt, TR, "internar"),
    (Pt, TR, "tratamento"),
    (Pt, TR, "dependência"),
    (Pt, TR, "dependencia"),
    (Pt, TR, "vício"),
    (Pt, TR, "drogas"),
    (Pt, TR, "álcool"),
    (Pt, TR, "alcool"),
    (Pt, TR, "crack"),
    (Pt, TR, "cocaína"),
    (Pt, TR, "recaída"),
    (Pt, TR, "desintoxicação"),
    // en
    (En, AE, "suicide"),
    (En, AE, "suicidal"),
    (En, AE, "kill myself"),
    (En, AE, "hurt myself"),
    (En, AE, "harm myself"),
    (En, AE, "self harm"),
    (En, AE, "end my life"),
    (En, AE, "want to die"),
    (En, AE, "overdose"),
    (En, AE, "overdosed"),
    (En, EM, "emergency"),
    (En, EM, "crisis"),
    (En, EM, "urgent"),
    (En, EM, "urgent help"),
    (En, EM, "immediately"),
    (En, EM, "ambulance"),
    (En, EM, "poisoning"),
    (En, DI, "desperate"),
    (En, DI, "hopeless"),
    (En, DI, "can't take it"),
    (En, DI, "cannot take it"),
    (En, DI, "can't go on"),
    (En, DI, "no way out"),
    (En, DI, "panic"),
    (En, TR, "addiction"),
    (En, TR, "addicted"),
    (En, TR, "rehab"),
    (En, TR, "detox"),
    (En, TR, "admission"),
    (En, TR, "relapse"),
    (En, TR, "withdrawal"),
    (En, TR, "drugs"),
    (En, TR, "alcohol"),
    (En, TR, "cocaine"),
    // es
    (Es, AE, "suicidio"),
    (Es, AE, "matarme"),
    (Es, AE, "hacerme daño"),
    (Es, AE, "quitarme la vida"),
    (Es, AE, "quiero morir"),
    (Es, AE, "sobredosis"),
    (Es, EM, "emergencia"),
    (Es, EM, "crisis"),
    (Es, EM, "urgente"),
    (Es, EM, "socorro"),
    (Es, EM, "inmediatamente"),
    (Es, EM, "intoxicación"),
    (Es, DI, "desesperado"),
    (Es, DI, "desesperada"),
    (Es, DI, "no aguanto más"),
    (Es, DI, "no aguanto mas"),
    (Es, DI, "pánico"),
    (Es, TR, "adicción"),
    (Es, TR, "adiccion"),
    (Es, TR, "tratamiento"),
    (Es, TR, "internación"),
    (Es, TR, "drogas"),
    (Es, TR, "alcohol"),
    (Es, TR, "recaída"),
    (Es, TR, "desintoxicación"),
    // fr
    (Fr, AE, "suicide"),
    (Fr, AE, "me tuer"),
    (Fr, AE, "me faire du mal"),
    (Fr, AE, "en finir"),
    (Fr, AE, "veux mourir"),
    (Fr, AE, "surdose"),
    (Fr, EM, "urgence"),
    (Fr, EM, "crise"),
    (Fr, EM, "urgent"),
    (Fr, EM, "au secours"),
    (Fr, EM, "immédiatement"),
    (Fr, DI, "désespéré"),
    (Fr, DI, "désespérée"),
    (Fr, DI, "n'en peux plus"),
    (Fr, DI, "panique"),
    (Fr, TR, "addiction"),
    (Fr, TR, "dépendance"),
    (Fr, TR, "désintoxication"),
    (Fr, TR, "hospitalisation"),
    (Fr, TR, "drogue"),
    (Fr, TR, "alcool"),
    (Fr, TR, "rechute"),
    // it
    (It, AE, "suicidio"),
    (It, AE, "uccidermi"),
    (It, AE, "farmi del male"),
    (It, AE, "farla finita"),
    (It, AE, "voglio morire"),
    (It, AE, "overdose"),
    (It, EM, "emergenza"),
    (It, EM, "crisi"),
    (It, EM, "urgente"),
    (It, EM, "soccorso"),
    (It, EM, "subito"),
    (It, DI, "disperato"),
    (It, DI, "disperata"),
    (It, DI, "non ce la faccio più"),
    (It, DI, "panico"),
    (It, TR, "dipendenza"),
    (It, TR, "disintossicazione"),
    (It, TR, "ricovero"),
    (It, TR, "droga"),
    (It, TR, "alcol"),
    (It, TR, "ricaduta"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule {
    pub term: String,
    pub weight: f64,
    pub category: KeywordCategory,
    /// `term` as a padded token string, ready for substring matching.
    surface: String,
}

impl KeywordRule {
    pub fn new(term: &str, weight: f64, category: KeywordCategory) -> Self {
        Self {
            term: term.to_lowercase(),
            weight,
            category,
            surface: match_surface(term),
        }
    }
}

/// What the table found in one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordScan {
    pub weight_sum: f64,
    pub matched: BTreeSet<String>,
    pub always_escalate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    rules: HashMap<LanguageCode, Vec<KeywordRule>>,
}

impl KeywordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The clinic's stock keyword list for all supported languages.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (lang, category, term) in BUILTIN {
            table.insert(*lang, term, *category);
        }
        table
    }

    /// Adds a term with its category's default weight.
    pub fn insert(&mut self, language: LanguageCode, term: &str, category: KeywordCategory) {
        self.insert_weighted(language, term, category, category_weight(category));
    }

    pub fn insert_weighted(&mut self, language: LanguageCode, term: &str, category: KeywordCategory, weight: f64) {
        let rules = self.rules.entry(language).or_default();
        let rule = KeywordRule::new(term, weight, category);
        if !rules.iter().any(|r| r.term == rule.term) {
            rules.push(rule);
        }
    }

    pub fn rules_for(&self, language: LanguageCode) -> &[KeywordRule] {
        self.rules.get(&language).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scans `text` with the rules of `language`, plus the always-escalate
    /// rules of every other language. Each term counts once even when the
    /// same word is listed under several languages.
    pub fn scan(&self, text: &str, language: LanguageCode) -> KeywordScan {
        let surface = match_surface(text);
        let mut scan = KeywordScan::default();

        let own = self.rules_for(language).iter();
        let foreign = self
            .rules
            .iter()
            .filter(|(lang, _)| **lang != language)
            .flat_map(|(_, rules)| rules.iter())
            .filter(|r| r.category == KeywordCategory::AlwaysEscalate);

        for rule in own.chain(foreign) {
            if scan.matched.contains(&rule.term) || !surface.contains(&rule.surface) {
                continue;
            }
            scan.weight_sum += rule.weight;
            if rule.category == KeywordCategory::AlwaysEscalate {
                scan.always_escalate = true;
            }
            scan.matched.insert(rule.term.clone());
        }

        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_language() {
        let table = KeywordTable::builtin();
        for lang in LanguageCode::ALL {
            assert!(
                table.rules_for(lang).iter().any(|r| r.category == KeywordCategory::AlwaysEscalate),
                "{lang} has no always-escalate terms"
            );
        }
    }

    #[test]
    fn phrases_match_on_word_boundaries() {
        let table = KeywordTable::builtin();
        let scan = table.scan("I want to hurt myself", LanguageCode::En);
        assert!(scan.always_escalate);
        assert!(scan.matched.contains("hurt myself"));

        // "crisis" inside another word must not match
        let scan = table.scan("the crisisline brochure", LanguageCode::En);
        assert!(scan.matched.is_empty());
    }

    #[test]
    fn each_keyword_counts_once() {
        let table = KeywordTable::builtin();
        let scan = table.scan("urgent urgent URGENT", LanguageCode::En);
        assert_eq!(scan.matched.len(), 1);
        assert!((scan.weight_sum - 0.45).abs() < 1e-9);
    }

    #[test]
    fn always_escalate_is_checked_across_languages() {
        let table = KeywordTable::builtin();
        // Portuguese self-harm phrase in a conversation detected as English
        let scan = table.scan("eu vou me matar", LanguageCode::En);
        assert!(scan.always_escalate);
        // but other Portuguese categories are not applied
        let scan = table.scan("tratamento", LanguageCode::En);
        assert!(scan.matched.is_empty());
    }

    #[test]
    fn apostrophe_phrases_match() {
        let table = KeywordTable::builtin();
        let scan = table.scan("I can't take it anymore", LanguageCode::En);
        assert!(scan.matched.contains("can't take it"));
        let scan = table.scan("je n'en peux plus", LanguageCode::Fr);
        assert!(scan.matched.contains("n'en peux plus"));
    }

    #[test]
    fn custom_weights() {
        let mut table = KeywordTable::new();
        table.insert_weighted(LanguageCode::En, "visiting", KeywordCategory::Treatment, 0.3);
        let scan = table.scan("visiting hours", LanguageCode::En);
        assert!((scan.weight_sum - 0.3).abs() < 1e-9);
        assert!(!scan.always_escalate);
    }
}
