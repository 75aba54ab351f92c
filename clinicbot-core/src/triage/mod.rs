//! src/triage/mod.rs
//!
//! Per-message classification: language, sentiment/urgency and the tone the
//! reply should take. Everything here is synchronous and side-effect free
//! except the optional translation step inside the sentiment analyzer.

pub mod keywords;
pub mod language;
pub mod lexicon;
pub mod sentiment;
pub mod tone;

use once_cell::sync::Lazy;
use regex::Regex;

pub use keywords::{KeywordRule, KeywordScan, KeywordTable};
pub use language::LanguageDetector;
pub use sentiment::{ConversationTrend, SentimentAnalyzer, TrendDirection, analyze_trend};
pub use tone::suggest_tone;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("static regex")
});
static REPEATED_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([!?.,;:])[!?.,;:]+").expect("static regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Strips URLs, collapses runs of punctuation and squashes whitespace.
pub fn clean_text(text: &str) -> String {
    let without_urls = URL_RE.replace_all(text, " ");
    let collapsed = REPEATED_PUNCT_RE.replace_all(&without_urls, "$1");
    WHITESPACE_RE.replace_all(&collapsed, " ").trim().to_string()
}

/// Lowercased word tokens. Apostrophes and hyphens split words, so
/// "can't" becomes `["can", "t"]` and "n'en" becomes `["n", "en"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Space-delimited token string used for whole-word phrase matching.
pub(crate) fn match_surface(text: &str) -> String {
    let tokens = tokenize(text);
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    out.push_str(&tokens.join(" "));
    out.push(' ');
    out
}
