// File: clinicbot-common/src/models/conversation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::language::LanguageCode;
use crate::models::message::{Channel, Message, Sender};
use crate::models::ticket::Ticket;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub language: LanguageCode,
    pub channel: Channel,
    pub started_at: DateTime<Utc>,
    /// Oldest first.
    pub messages: Vec<Message>,
    /// The Open/InProgress ticket, if any.
    pub active_ticket: Option<Ticket>,
}

impl Conversation {
    pub fn new(conversation_id: Uuid, language: LanguageCode, channel: Channel) -> Self {
        Self {
            conversation_id,
            language,
            channel,
            started_at: Utc::now(),
            messages: Vec::new(),
            active_ticket: None,
        }
    }

    pub fn has_active_ticket(&self) -> bool {
        self.active_ticket.as_ref().is_some_and(|t| t.is_active())
    }

    /// Most recent `limit` messages, oldest first.
    pub fn recent_messages(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn patient_texts(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.sender == Sender::Patient)
            .map(|m| m.text.as_str())
            .collect()
    }
}
