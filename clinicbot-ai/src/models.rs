use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use clinicbot_common::models::{LanguageCode, Tone};

/// Which wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions.
    OpenAi,
    /// Google Gemini `generateContent`.
    Gemini,
    /// Locally hosted model behind an Ollama-style `/api/chat`.
    Local,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "local" | "ollama" => Ok(ProviderKind::Local),
            _ => Err(format!("Unknown provider kind: {}", s)),
        }
    }
}

/// Configuration for an AI provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name the provider is registered under (what config selects by)
    pub name: String,

    /// The type of provider
    pub kind: ProviderKind,

    /// Base URL for API requests
    #[serde(default)]
    pub api_base: Option<String>,

    /// API key for authentication (unused by local models)
    #[serde(default)]
    pub api_key: String,

    /// Default model to use with this provider
    pub default_model: String,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Additional provider-specific configuration options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

/// A single chat turn handed to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Prior turns, oldest first. Does not include `prompt`.
    pub history: Vec<ChatMessage>,
    pub prompt: String,
    pub language: LanguageCode,
    pub tone_hint: Tone,
    pub timeout: Duration,
}

impl GenerationRequest {
    /// System prompt, history and the new user turn, in wire order.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut all = Vec::with_capacity(self.history.len() + 2);
        all.push(ChatMessage {
            role: "system".to_string(),
            content: self.system_prompt.clone(),
        });
        all.extend(self.history.iter().cloned());
        all.push(ChatMessage::user(self.prompt.clone()));
        all
    }
}
