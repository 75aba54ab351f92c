use std::collections::HashMap;

use clinicbot_common::models::LanguageCode;

/// Pre-authored replies used when no provider could answer in time.
#[derive(Debug, Clone)]
pub struct FallbackReplies {
    replies: HashMap<LanguageCode, String>,
    base_language: LanguageCode,
}

impl FallbackReplies {
    pub fn new(base_language: LanguageCode) -> Self {
        let replies = LanguageCode::ALL
            .iter()
            .map(|lang| (*lang, Self::builtin(*lang).to_string()))
            .collect();
        Self { replies, base_language }
    }

    fn builtin(language: LanguageCode) -> &'static str {
        match language {
            LanguageCode::Pt => "Desculpe, estou com dificuldades no momento. Nossa equipe está disponível 24 horas: se for uma emergência, ligue para a clínica ou para o SAMU (192).",
            LanguageCode::En => "Sorry, I'm having trouble right now. Our team is available 24/7: if this is an emergency, please call the clinic or your local emergency number.",
            LanguageCode::Es => "Lo siento, tengo dificultades en este momento. Nuestro equipo está disponible 24 horas: si es una emergencia, llame a la clínica o al número de emergencias local.",
            LanguageCode::Fr => "Désolé, je rencontre des difficultés pour le moment. Notre équipe est disponible 24h/24 : en cas d'urgence, appelez la clinique ou le numéro d'urgence local.",
            LanguageCode::It => "Mi dispiace, ho delle difficoltà in questo momento. Il nostro team è disponibile 24 ore su 24: in caso di emergenza, chiami la clinica o il numero di emergenza locale.",
        }
    }

    /// Replaces the built-in text for one language (e.g. to add the clinic's
    /// phone number).
    pub fn with_override(mut self, language: LanguageCode, text: impl Into<String>) -> Self {
        self.replies.insert(language, text.into());
        self
    }

    pub fn reply_for(&self, language: LanguageCode) -> &str {
        self.replies
            .get(&language)
            .or_else(|| self.replies.get(&self.base_language))
            .map(String::as_str)
            .unwrap_or_else(|| Self::builtin(self.base_language))
    }
}

impl Default for FallbackReplies {
    fn default() -> Self {
        Self::new(LanguageCode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_a_reply() {
        let replies = FallbackReplies::default();
        for lang in LanguageCode::ALL {
            assert!(!replies.reply_for(lang).is_empty());
        }
        assert!(replies.reply_for(LanguageCode::En).starts_with("Sorry, I'm having trouble"));
    }

    #[test]
    fn override_wins() {
        let replies = FallbackReplies::default().with_override(LanguageCode::En, "Call 555-0100.");
        assert_eq!(replies.reply_for(LanguageCode::En), "Call 555-0100.");
    }
}
