use async_trait::async_trait;
use serde::Serialize;

use crate::models::GenerationRequest;

/// Why a provider call failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no provider registered as '{0}'")]
    UnknownProvider(String),
}

impl ProviderError {
    /// Auth and registry failures will not fix themselves on a retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Auth(_) | ProviderError::UnknownProvider(_))
    }

    /// Maps a non-success HTTP status into the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = format!("{} {}", status.as_u16(), body.chars().take(200).collect::<String>());
        match status.as_u16() {
            401 | 403 => ProviderError::Auth(detail),
            429 => ProviderError::RateLimited(detail),
            _ => ProviderError::Transport(detail),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            ProviderError::from_status(status, "")
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Raised when a reply had to come from the fallback table. Carried for
/// logging and alerting only, never shown to the patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderUnavailable {
    pub provider: String,
    pub reason: ProviderError,
    pub attempts: u32,
}

/// One text-generation backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}
