pub mod fallback;
pub mod gateway;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod traits;
pub mod translator;

// Re-export public APIs
pub use fallback::FallbackReplies;
pub use gateway::{ConversationContext, Reply, ReplySource, ResponseGateway};
pub use models::{ChatMessage, GenerationRequest, ProviderConfig, ProviderKind};
pub use prompt::PromptBuilder;
pub use provider::Provider;
pub use traits::{ModelProvider, ProviderError, ProviderUnavailable};
pub use translator::ProviderTranslator;
