// File: src/services/mod.rs

pub mod conversation_service;

pub use conversation_service::{ConversationService, TriageResponse};
