use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use clinicbot_common::models::{LanguageCode, Tone};

use crate::fallback::FallbackReplies;
use crate::models::{ChatMessage, GenerationRequest};
use crate::prompt::PromptBuilder;
use crate::provider::Provider;
use crate::traits::{ProviderError, ProviderUnavailable};

/// Conversation state the gateway needs to phrase a reply.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub language: LanguageCode,
    pub tone_hint: Tone,
    /// Prior turns, oldest first.
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ReplySource {
    Provider { name: String, attempts: u32 },
    Fallback(ProviderUnavailable),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ReplySource::Fallback(_))
    }

    pub fn unavailable(&self) -> Option<&ProviderUnavailable> {
        match &self.source {
            ReplySource::Fallback(u) => Some(u),
            ReplySource::Provider { .. } => None,
        }
    }
}

/// Front door to the AI providers. Never returns an error: when the chosen
/// provider cannot answer within the retry budget the caller gets the
/// pre-authored fallback for the conversation language.
pub struct ResponseGateway {
    /// Provider registry for the configured backends
    provider: Arc<Provider>,

    /// Provider used when the caller does not name one
    default_provider: String,

    prompts: PromptBuilder,
    fallback: FallbackReplies,

    /// Bound on each attempt
    timeout: Duration,

    /// Retries after the first attempt; capped at one
    max_retries: u32,
}

impl ResponseGateway {
    pub fn new(provider: Arc<Provider>, default_provider: impl Into<String>) -> Self {
        Self {
            provider,
            default_provider: default_provider.into(),
            prompts: PromptBuilder::default(),
            fallback: FallbackReplies::default(),
            timeout: Duration::from_secs(20),
            max_retries: 1,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.min(1);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackReplies) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set the default provider
    pub fn set_default_provider(&mut self, provider: impl Into<String>) {
        self.default_provider = provider.into();
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Get the provider registry
    pub fn provider(&self) -> Arc<Provider> {
        self.provider.clone()
    }

    /// Generates the assistant's answer to `message`.
    pub async fn generate_reply(
        &self,
        message: &str,
        context: &ConversationContext,
        provider: Option<&str>,
    ) -> Reply {
        let provider_name = provider.unwrap_or(&self.default_provider).to_string();

        let Some(backend) = self.provider.get(&provider_name).await else {
            error!("No AI provider registered as '{}'", provider_name);
            return self.fallback_reply(
                context.language,
                ProviderUnavailable {
                    reason: ProviderError::UnknownProvider(provider_name.clone()),
                    provider: provider_name,
                    attempts: 0,
                },
            );
        };

        let request = GenerationRequest {
            system_prompt: self.prompts.system_prompt(context.language, context.tone_hint),
            history: context.history.clone(),
            prompt: message.to_string(),
            language: context.language,
            tone_hint: context.tone_hint,
            timeout: self.timeout,
        };

        let max_attempts = 1 + self.max_retries;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(self.timeout, backend.generate(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            match outcome {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("Provider '{}' answered after {} attempt(s)", provider_name, attempts);
                    return Reply {
                        text,
                        source: ReplySource::Provider { name: provider_name, attempts },
                    };
                }
                Ok(_) => {
                    let err = ProviderError::InvalidResponse("empty completion".to_string());
                    if attempts >= max_attempts {
                        return self.give_up(&provider_name, err, attempts, context.language);
                    }
                    warn!("Provider '{}' returned an empty reply; retrying", provider_name);
                }
                Err(err) => {
                    if attempts >= max_attempts || !err.is_retryable() {
                        return self.give_up(&provider_name, err, attempts, context.language);
                    }
                    warn!("Provider '{}' failed (attempt {}): {}; retrying", provider_name, attempts, err);
                }
            }
        }
    }

    fn give_up(&self, provider: &str, reason: ProviderError, attempts: u32, language: LanguageCode) -> Reply {
        warn!(
            "ProviderUnavailable: provider='{}' attempts={} reason={}; using fallback reply",
            provider, attempts, reason
        );
        self.fallback_reply(
            language,
            ProviderUnavailable {
                provider: provider.to_string(),
                reason,
                attempts,
            },
        )
    }

    fn fallback_reply(&self, language: LanguageCode, unavailable: ProviderUnavailable) -> Reply {
        Reply {
            text: self.fallback.reply_for(language).to_string(),
            source: ReplySource::Fallback(unavailable),
        }
    }
}
