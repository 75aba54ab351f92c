// File: clinicbot-common/src/models/language.rs

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Locales the clinic answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    Pt,
    En,
    Es,
    Fr,
    It,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 5] = [
        LanguageCode::Pt,
        LanguageCode::En,
        LanguageCode::Es,
        LanguageCode::Fr,
        LanguageCode::It,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::Pt => "pt",
            LanguageCode::En => "en",
            LanguageCode::Es => "es",
            LanguageCode::Fr => "fr",
            LanguageCode::It => "it",
        }
    }

    /// Human-readable name, used in prompts and staff views.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageCode::Pt => "Português",
            LanguageCode::En => "English",
            LanguageCode::Es => "Español",
            LanguageCode::Fr => "Français",
            LanguageCode::It => "Italiano",
        }
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        LanguageCode::Pt
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageCode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pt" | "pt-br" | "pt_br" => Ok(LanguageCode::Pt),
            "en" | "en-us" | "en-gb" => Ok(LanguageCode::En),
            "es" => Ok(LanguageCode::Es),
            "fr" => Ok(LanguageCode::Fr),
            "it" => Ok(LanguageCode::It),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regional_variants() {
        assert_eq!("pt-BR".parse::<LanguageCode>().unwrap(), LanguageCode::Pt);
        assert_eq!("EN".parse::<LanguageCode>().unwrap(), LanguageCode::En);
        assert!("de".parse::<LanguageCode>().is_err());
    }
}
