// File: clinicbot-common/src/models/message.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::language::LanguageCode;

/// Where an inbound message came from. Channel adapters normalize their
/// native payloads into [`InboundMessage`] before handing them over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WebWidget,
    WhatsApp,
    Telegram,
    Cli,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::WebWidget => write!(f, "web_widget"),
            Channel::WhatsApp => write!(f, "whatsapp"),
            Channel::Telegram => write!(f, "telegram"),
            Channel::Cli => write!(f, "cli"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "web" | "web_widget" | "widget" => Ok(Channel::WebWidget),
            "whatsapp" => Ok(Channel::WhatsApp),
            "telegram" => Ok(Channel::Telegram),
            "cli" => Ok(Channel::Cli),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Patient,
    Assistant,
    Staff,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Patient => write!(f, "patient"),
            Sender::Assistant => write!(f, "assistant"),
            Sender::Staff => write!(f, "staff"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Sender::Patient),
            "assistant" => Ok(Sender::Assistant),
            "staff" => Ok(Sender::Staff),
            _ => Err(format!("Unknown sender: {}", s)),
        }
    }
}

/// The common shape every channel adapter produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: Uuid,
    pub text: String,
    pub channel: Channel,
}

impl InboundMessage {
    pub fn new(conversation_id: Uuid, text: impl Into<String>, channel: Channel) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            channel,
        }
    }
}

/// A stored chat line. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub language: LanguageCode,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender: Sender, text: &str, language: LanguageCode) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            conversation_id,
            sender,
            text: text.to_string(),
            language,
            timestamp: Utc::now(),
        }
    }
}
