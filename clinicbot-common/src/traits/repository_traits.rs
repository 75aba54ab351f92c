use std::collections::BTreeMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::error::Error;
use crate::models::conversation::Conversation;
use crate::models::language::LanguageCode;
use crate::models::message::{Channel, Message};
use crate::models::ticket::{CrmSyncState, Ticket, TicketStatus};

/// Conversations and their append-only message log.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Loads the conversation (messages oldest first), creating an empty one
    /// on first contact. `active_ticket` is left for the ticket store to fill.
    async fn get_or_create(
        &self,
        conversation_id: Uuid,
        language: LanguageCode,
        channel: Channel,
    ) -> Result<Conversation, Error>;

    async fn get_conversation(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error>;

    async fn append_message(&self, message: &Message) -> Result<(), Error>;

    async fn set_language(&self, conversation_id: Uuid, language: LanguageCode) -> Result<(), Error>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Atomically inserts `ticket` unless its conversation already has an
    /// Open/InProgress ticket, in which case `Error::DuplicateActiveTicket`.
    async fn create_unless_active(&self, ticket: &Ticket) -> Result<(), Error>;

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, Error>;

    async fn active_for_conversation(&self, conversation_id: Uuid) -> Result<Option<Ticket>, Error>;

    /// Compare-and-set on status: fails with `NotFound` if the stored status
    /// is no longer `expected`. `notes: None` keeps the stored note.
    async fn update_status(
        &self,
        ticket_id: Uuid,
        expected: TicketStatus,
        status: TicketStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Also stamps the ticket as just attempted, which moves it to the back
    /// of `list_with_failed_sync`.
    async fn update_crm_sync_state(
        &self,
        ticket_id: Uuid,
        states: &BTreeMap<String, CrmSyncState>,
    ) -> Result<(), Error>;

    /// Tickets with at least one `Failed` CRM target, least recently
    /// attempted first.
    async fn list_with_failed_sync(&self, limit: i64) -> Result<Vec<Ticket>, Error>;

    async fn list_tickets(&self, status: Option<TicketStatus>, limit: i64) -> Result<Vec<Ticket>, Error>;
}
