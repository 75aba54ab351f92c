//! src/services/conversation_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clinicbot_ai::{ChatMessage, ConversationContext, ReplySource, ResponseGateway};
use clinicbot_common::models::{
    Conversation, InboundMessage, LanguageCode, Message, Priority, SentimentResult, Sender, Ticket,
};
use clinicbot_common::traits::ConversationRepository;
use clinicbot_common::Error;

use crate::crm::build_lead;
use crate::eventbus::{EventBus, TriageEvent};
use crate::tickets::{assign_priority, TicketManager};
use crate::triage::{analyze_trend, ConversationTrend, LanguageDetector, SentimentAnalyzer};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
const SUMMARY_MAX_CHARS: usize = 280;

/// What a channel adapter sends back to the patient, plus the triage
/// details staff tooling may want.
#[derive(Debug, Clone, Serialize)]
pub struct TriageResponse {
    pub reply: String,
    pub ticket_opened: bool,
    pub ticket_id: Option<Uuid>,
    pub priority: Priority,
    pub language: LanguageCode,
    pub sentiment: SentimentResult,
    pub reply_source: ReplySource,
}

/// Runs one inbound message through detection, triage, escalation and
/// reply generation.
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    tickets: Arc<TicketManager>,
    detector: LanguageDetector,
    analyzer: Arc<SentimentAnalyzer>,
    gateway: Arc<ResponseGateway>,
    event_bus: Arc<EventBus>,
    crm_targets: Vec<String>,
    history_limit: usize,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        tickets: Arc<TicketManager>,
        detector: LanguageDetector,
        analyzer: Arc<SentimentAnalyzer>,
        gateway: Arc<ResponseGateway>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        debug!("ConversationService::new() called");
        Self {
            conversations,
            tickets,
            detector,
            analyzer,
            gateway,
            event_bus,
            crm_targets: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// CRMs every new ticket is pushed to.
    pub fn with_crm_targets(mut self, targets: Vec<String>) -> Self {
        self.crm_targets = targets;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn tickets(&self) -> Arc<TicketManager> {
        self.tickets.clone()
    }

    /// Handles one patient message:
    ///  1. Loads (or creates) the conversation.
    ///  2. Detects the message language, keeping the conversation's on doubt.
    ///  3. Scores sentiment and urgency.
    ///  4. Stores the patient message and announces the triage result
    ///     without waiting on slow subscribers.
    ///  5. Opens a ticket when urgency calls for it.
    ///  6. Generates a reply in the conversation language with the tone hint.
    ///  7. Stores the reply.
    ///  8. Hands a new ticket (lead and transcript) to the background workers.
    ///
    /// Always produces a reply. Storage and ticket failures are logged.
    pub async fn handle_message(&self, inbound: InboundMessage) -> TriageResponse {
        let conversation_id = inbound.conversation_id;
        let text = inbound.text.trim().to_string();
        let detected = self.detector.classify(&text);

        // 1) Conversation
        let mut conversation = match self
            .conversations
            .get_or_create(
                conversation_id,
                detected.unwrap_or(self.detector.base_language()),
                inbound.channel,
            )
            .await
        {
            Ok(c) => c,
            Err(e) => {
                error!("Could not load conversation {}: {}", conversation_id, e);
                Conversation::new(conversation_id, self.detector.base_language(), inbound.channel)
            }
        };

        // 2) Language
        let language = detected.unwrap_or(conversation.language);
        if language != conversation.language {
            debug!(
                "Conversation {} switched language {} -> {}",
                conversation_id, conversation.language, language
            );
            if let Err(e) = self.conversations.set_language(conversation_id, language).await {
                warn!("Could not store language for {}: {}", conversation_id, e);
            }
            conversation.language = language;
        }

        // 3) Sentiment
        let sentiment = self.analyzer.analyze(&text, language).await;
        debug!(
            "Conversation {} polarity={:.2} urgency={:.2} keywords={:?}",
            conversation_id, sentiment.polarity, sentiment.urgency_score, sentiment.matched_keywords
        );

        // 4) Store patient message
        let history = self.history(&conversation);
        let patient_msg = Message::new(conversation_id, Sender::Patient, &text, language);
        if let Err(e) = self.conversations.append_message(&patient_msg).await {
            error!("Could not store patient message for {}: {}", conversation_id, e);
        }
        conversation.messages.push(patient_msg.clone());

        // Observational; a lagging subscriber must not hold up the reply.
        self.event_bus
            .try_publish(TriageEvent::MessageTriaged {
                conversation_id,
                message_id: patient_msg.message_id,
                language,
                sentiment: sentiment.clone(),
                timestamp: Utc::now(),
            })
            .await;

        // 5) Ticket
        let opened = self.open_ticket(&conversation, &sentiment, &text).await;

        // 6) Reply
        let context = ConversationContext {
            language,
            tone_hint: sentiment.suggested_tone,
            history,
        };
        let reply = self.gateway.generate_reply(&text, &context, None).await;
        if let Some(details) = reply.unavailable() {
            warn!(
                "Provider '{}' unavailable for {} after {} attempt(s): {}",
                details.provider, conversation_id, details.attempts, details.reason
            );
            self.event_bus
                .try_publish(TriageEvent::ProviderUnavailable {
                    conversation_id,
                    details: details.clone(),
                })
                .await;
        }

        // 7) Store reply
        let assistant_msg = Message::new(conversation_id, Sender::Assistant, &reply.text, language);
        if let Err(e) = self.conversations.append_message(&assistant_msg).await {
            error!("Could not store reply for {}: {}", conversation_id, e);
        }
        conversation.messages.push(assistant_msg);

        // 8) Background hand-off
        if let Some(ticket) = &opened {
            let lead = build_lead(ticket, &conversation, Some(&sentiment), &text);
            let bus = self.event_bus.clone();
            let event = TriageEvent::TicketOpened {
                ticket: ticket.clone(),
                lead,
            };
            // Detached so the hand-off completes even if this request is dropped.
            tokio::spawn(async move {
                bus.publish(event).await;
            });
        }

        let priority = opened
            .as_ref()
            .map(|t| t.priority)
            .unwrap_or_else(|| assign_priority(&sentiment, self.tickets.threshold()));

        TriageResponse {
            reply: reply.text,
            ticket_opened: opened.is_some(),
            ticket_id: opened.as_ref().map(|t| t.ticket_id),
            priority,
            language,
            sentiment,
            reply_source: reply.source,
        }
    }

    async fn open_ticket(&self, conversation: &Conversation, sentiment: &SentimentResult, text: &str) -> Option<Ticket> {
        let summary = summarize(text, sentiment);
        match self
            .tickets
            .open_if_needed(conversation, sentiment, &summary, &self.crm_targets)
            .await
        {
            Ok(Some(ticket)) => {
                info!(
                    "Escalated conversation {} as {} ticket {}",
                    conversation.conversation_id, ticket.priority, ticket.ticket_id
                );
                Some(ticket)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Ticket decision failed for {}: {}", conversation.conversation_id, e);
                None
            }
        }
    }

    /// Prior turns, oldest first, in the shape the AI gateway takes.
    fn history(&self, conversation: &Conversation) -> Vec<ChatMessage> {
        conversation
            .recent_messages(self.history_limit)
            .iter()
            .map(|m| match m.sender {
                Sender::Patient => ChatMessage::user(m.text.clone()),
                Sender::Assistant | Sender::Staff => ChatMessage::assistant(m.text.clone()),
            })
            .collect()
    }

    /// Re-scores every patient message of a conversation and summarises how
    /// it is evolving.
    pub async fn conversation_trend(&self, conversation_id: Uuid) -> Result<ConversationTrend, Error> {
        let conversation = self
            .conversations
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))?;

        let mut results = Vec::new();
        for msg in conversation.messages.iter().filter(|m| m.sender == Sender::Patient) {
            results.push(self.analyzer.analyze(&msg.text, msg.language).await);
        }
        Ok(analyze_trend(&results, self.tickets.threshold()))
    }
}

fn summarize(text: &str, sentiment: &SentimentResult) -> String {
    let mut summary: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
    if text.chars().count() > SUMMARY_MAX_CHARS {
        summary.push('…');
    }
    if !sentiment.matched_keywords.is_empty() {
        let keywords: Vec<&str> = sentiment.matched_keywords.iter().map(String::as_str).collect();
        summary.push_str(&format!(" [keywords: {}]", keywords.join(", ")));
    }
    summary
}
