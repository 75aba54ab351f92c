use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use clinicbot_common::models::{LanguageCode, Tone};
use clinicbot_common::traits::Translator;

use crate::models::GenerationRequest;
use crate::traits::ModelProvider;

/// Best-effort translation through a chat model. Any failure yields `None`
/// so callers can carry on with the untranslated text.
pub struct ProviderTranslator {
    provider: Arc<dyn ModelProvider>,
    timeout: Duration,
}

impl ProviderTranslator {
    pub fn new(provider: Arc<dyn ModelProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl Translator for ProviderTranslator {
    async fn translate(&self, text: &str, from: LanguageCode, to: LanguageCode) -> Option<String> {
        if from == to || text.trim().is_empty() {
            return Some(text.to_string());
        }

        let request = GenerationRequest {
            system_prompt: format!(
                "Translate the user's message from {} to {}. Reply with the translation only.",
                from.display_name(),
                to.display_name()
            ),
            history: Vec::new(),
            prompt: text.to_string(),
            language: to,
            tone_hint: Tone::Neutral,
            timeout: self.timeout,
        };

        match tokio::time::timeout(self.timeout, self.provider.generate(&request)).await {
            Ok(Ok(translated)) if !translated.trim().is_empty() => Some(translated),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                debug!("Translation via '{}' failed: {}", self.provider.name(), e);
                None
            }
            Err(_) => {
                debug!("Translation via '{}' timed out", self.provider.name());
                None
            }
        }
    }
}
