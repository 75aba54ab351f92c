//! src/repositories/memory.rs
//!
//! DashMap-backed stores for tests and database-less runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use clinicbot_common::models::{Channel, Conversation, CrmSyncState, LanguageCode, Message, Ticket, TicketStatus};
use clinicbot_common::traits::{ConversationRepository, TicketRepository};
use clinicbot_common::Error;

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: DashMap<Uuid, Conversation>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn get_or_create(
        &self,
        conversation_id: Uuid,
        language: LanguageCode,
        channel: Channel,
    ) -> Result<Conversation, Error> {
        let conv = self
            .conversations
            .entry(conversation_id)
            .or_insert_with(|| Conversation::new(conversation_id, language, channel));
        Ok(conv.clone())
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error> {
        Ok(self.conversations.get(&conversation_id).map(|c| c.clone()))
    }

    async fn append_message(&self, message: &Message) -> Result<(), Error> {
        let mut conv = self
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {}", message.conversation_id)))?;
        if conv.messages.iter().any(|m| m.message_id == message.message_id) {
            return Ok(());
        }
        conv.messages.push(message.clone());
        Ok(())
    }

    async fn set_language(&self, conversation_id: Uuid, language: LanguageCode) -> Result<(), Error> {
        let mut conv = self
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))?;
        conv.language = language;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: DashMap<Uuid, Ticket>,
    /// conversation_id -> ticket_id of its Open/InProgress ticket
    active: DashMap<Uuid, Uuid>,
    /// ticket_id -> sequence number of its last CRM sync write
    sync_touched: DashMap<Uuid, u64>,
    sync_seq: AtomicU64,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    fn touch_sync(&self, ticket_id: Uuid) {
        let seq = self.sync_seq.fetch_add(1, Ordering::SeqCst);
        self.sync_touched.insert(ticket_id, seq);
    }

    pub fn tickets_for(&self, conversation_id: Uuid) -> Vec<Ticket> {
        let mut found: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .map(|t| t.clone())
            .collect();
        found.sort_by_key(|t| t.created_at);
        found
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn create_unless_active(&self, ticket: &Ticket) -> Result<(), Error> {
        // The entry guard holds the shard lock for this conversation until
        // the ticket is stored.
        match self.active.entry(ticket.conversation_id) {
            Entry::Occupied(_) => Err(Error::DuplicateActiveTicket(ticket.conversation_id)),
            Entry::Vacant(slot) => {
                if ticket.is_active() {
                    slot.insert(ticket.ticket_id);
                }
                self.tickets.insert(ticket.ticket_id, ticket.clone());
                self.touch_sync(ticket.ticket_id);
                Ok(())
            }
        }
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, Error> {
        Ok(self.tickets.get(&ticket_id).map(|t| t.clone()))
    }

    async fn active_for_conversation(&self, conversation_id: Uuid) -> Result<Option<Ticket>, Error> {
        let Some(ticket_id) = self.active.get(&conversation_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.tickets.get(&ticket_id).map(|t| t.clone()).filter(|t| t.is_active()))
    }

    async fn update_status(
        &self,
        ticket_id: Uuid,
        expected: TicketStatus,
        status: TicketStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let conversation_id = {
            let mut ticket = self
                .tickets
                .get_mut(&ticket_id)
                .ok_or_else(|| Error::NotFound(format!("ticket {}", ticket_id)))?;
            if ticket.status != expected {
                return Err(Error::NotFound(format!(
                    "ticket {} in status {}",
                    ticket_id, expected
                )));
            }
            ticket.status = status;
            ticket.last_updated = at;
            if let Some(notes) = notes {
                ticket.notes = Some(notes.to_string());
            }
            ticket.conversation_id
        };

        if !status.is_active() {
            self.active.remove_if(&conversation_id, |_, id| *id == ticket_id);
        }
        Ok(())
    }

    async fn update_crm_sync_state(
        &self,
        ticket_id: Uuid,
        states: &BTreeMap<String, CrmSyncState>,
    ) -> Result<(), Error> {
        {
            let mut ticket = self
                .tickets
                .get_mut(&ticket_id)
                .ok_or_else(|| Error::NotFound(format!("ticket {}", ticket_id)))?;
            for (target, state) in states {
                ticket.crm_sync_state.insert(target.clone(), *state);
            }
        }
        self.touch_sync(ticket_id);
        Ok(())
    }

    async fn list_with_failed_sync(&self, limit: i64) -> Result<Vec<Ticket>, Error> {
        let mut found: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| t.crm_sync_state.values().any(|s| *s == CrmSyncState::Failed))
            .map(|t| t.clone())
            .collect();
        found.sort_by_key(|t| {
            let touched = self.sync_touched.get(&t.ticket_id).map(|s| *s).unwrap_or_default();
            (touched, t.created_at)
        });
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn list_tickets(&self, status: Option<TicketStatus>, limit: i64) -> Result<Vec<Ticket>, Error> {
        let mut found: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .map(|t| t.clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }
}
