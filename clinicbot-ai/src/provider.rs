use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

use crate::models::{ChatMessage, GenerationRequest, ProviderConfig, ProviderKind};
use crate::traits::{ModelProvider, ProviderError};

/// Sends `payload` and returns the parsed JSON body, mapping HTTP failures
/// into `ProviderError`.
async fn post_json(
    request: reqwest::RequestBuilder,
    payload: &serde_json::Value,
) -> Result<serde_json::Value, ProviderError> {
    let response = request.json(payload).send().await?;
    let status = response.status();

    // Get the raw response text first for better error handling
    let response_text = response.text().await?;
    tracing::debug!("Raw API response: {}", response_text);

    if !status.is_success() {
        tracing::error!("API returned status {}: {}", status, response_text);
        return Err(ProviderError::from_status(status, &response_text));
    }

    serde_json::from_str::<serde_json::Value>(&response_text).map_err(|e| {
        tracing::error!("Failed to parse API response as JSON: {:?}", e);
        ProviderError::InvalidResponse(format!("non-JSON response: {}", e))
    })
}

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::new();
        Self { config, client }
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let api_base = self.config.api_base.clone().unwrap_or_else(|| {
            "https://api.openai.com/v1".to_string()
        });

        let messages: Vec<serde_json::Value> = request
            .to_messages()
            .iter()
            .map(|msg| json!({ "role": msg.role, "content": msg.content }))
            .collect();

        let payload = json!({
            "model": self.config.default_model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        tracing::info!(
            "Making API call to {}/chat/completions (model={}, language={}, tone={})",
            api_base, self.config.default_model, request.language, request.tone_hint
        );

        let builder = self.client
            .post(format!("{}/chat/completions", api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .timeout(request.timeout);
        let data = post_json(builder, &payload).await?;

        // Check for API errors
        if let Some(error) = data.get("error") {
            tracing::error!("API returned error: {:?}", error);
            let error_message = error.get("message").and_then(|m| m.as_str()).unwrap_or("Unknown error");
            return Err(ProviderError::InvalidResponse(error_message.to_string()));
        }

        let content = data.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                tracing::error!("Response missing choices[0].message.content: {:?}", data);
                ProviderError::InvalidResponse("missing choices[0].message.content".to_string())
            })?;

        Ok(content.trim().to_string())
    }
}

/// Google Gemini provider implementation
pub struct GeminiProvider {
    config: ProviderConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::new();
        Self { config, client }
    }

    fn endpoint(&self) -> Result<Url, ProviderError> {
        let api_base = self.config.api_base.clone().unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });
        Url::parse_with_params(
            &format!("{}/models/{}:generateContent", api_base, self.config.default_model),
            &[("key", self.config.api_key.as_str())],
        )
        .map_err(|e| ProviderError::Transport(format!("bad Gemini endpoint: {}", e)))
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::Auth("GOOGLE_API_KEY not set".to_string()));
        }

        // Gemini has no system role in `contents`; it goes in systemInstruction.
        let prompt_turn = ChatMessage::user(request.prompt.clone());
        let contents: Vec<serde_json::Value> = request
            .history
            .iter()
            .chain(std::iter::once(&prompt_turn))
            .map(|msg| {
                let role = if msg.role == "assistant" { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": msg.content }] })
            })
            .collect();

        let payload = json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            }
        });

        tracing::info!("Making Gemini generateContent call (model={})", self.config.default_model);

        let builder = self.client.post(self.endpoint()?).timeout(request.timeout);
        let data = post_json(builder, &payload).await?;

        let text = data.get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.pointer("/content/parts/0/text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                tracing::error!("Gemini response missing candidate text: {:?}", data);
                ProviderError::InvalidResponse("missing candidates[0].content.parts[0].text".to_string())
            })?;

        Ok(text.trim().to_string())
    }
}

/// Locally hosted model (Ollama-style `/api/chat`)
pub struct LocalModelProvider {
    config: ProviderConfig,
    client: Client,
}

impl LocalModelProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::new();
        Self { config, client }
    }
}

#[async_trait]
impl ModelProvider for LocalModelProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let api_base = self.config.api_base.clone().unwrap_or_else(|| {
            "http://localhost:11434".to_string()
        });

        let messages: Vec<serde_json::Value> = request
            .to_messages()
            .iter()
            .map(|msg| json!({ "role": msg.role, "content": msg.content }))
            .collect();

        let payload = json!({
            "model": self.config.default_model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            }
        });

        tracing::debug!("Calling local model at {}/api/chat", api_base);

        let builder = self.client
            .post(format!("{}/api/chat", api_base))
            .timeout(request.timeout);
        let data = post_json(builder, &payload).await?;

        let content = data.pointer("/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("missing message.content".to_string()))?;

        Ok(content.trim().to_string())
    }
}

/// Registry of AI providers, keyed by configured name
pub struct Provider {
    providers: Arc<RwLock<HashMap<String, Arc<dyn ModelProvider>>>>,
}

impl Provider {
    /// Create a new provider registry
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Builds a registry holding one provider per config entry.
    pub async fn from_configs(configs: &[ProviderConfig]) -> Self {
        let registry = Self::new();
        for config in configs {
            registry.register_arc(Self::create(config.clone())).await;
        }
        registry
    }

    /// Register a new provider
    pub async fn register<P: ModelProvider + 'static>(&self, provider: P) {
        self.register_arc(Arc::new(provider)).await;
    }

    pub async fn register_arc(&self, provider: Arc<dyn ModelProvider>) {
        let mut providers = self.providers.write().await;
        tracing::debug!("Registering AI provider '{}'", provider.name());
        providers.insert(provider.name().to_string(), provider);
    }

    /// Get a provider by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn ModelProvider>> {
        let providers = self.providers.read().await;
        providers.get(name).cloned()
    }

    /// Get all registered provider names
    pub async fn get_all(&self) -> Vec<String> {
        let providers = self.providers.read().await;
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the implementation matching `config.kind`
    pub fn create(config: ProviderConfig) -> Arc<dyn ModelProvider> {
        match config.kind {
            ProviderKind::OpenAi => Arc::new(OpenAIProvider::new(config)),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)),
            ProviderKind::Local => Arc::new(LocalModelProvider::new(config)),
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            kind,
            api_base: None,
            api_key: "k".to_string(),
            default_model: "m".to_string(),
            max_tokens: 100,
            temperature: 0.2,
            options: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn registry_selects_by_configured_name() {
        let registry = Provider::from_configs(&[
            config("primary", ProviderKind::OpenAi),
            config("backup", ProviderKind::Gemini),
            config("onprem", ProviderKind::Local),
        ])
        .await;

        assert_eq!(registry.get_all().await, vec!["backup", "onprem", "primary"]);
        assert_eq!(registry.get("backup").await.unwrap().name(), "backup");
        assert!(registry.get("missing").await.is_none());
    }

    #[test]
    fn gemini_endpoint_carries_key() {
        let provider = GeminiProvider::new(config("g", ProviderKind::Gemini));
        let url = provider.endpoint().unwrap();
        assert!(url.path().ends_with("/models/m:generateContent"));
        assert_eq!(url.query(), Some("key=k"));
    }
}
