use std::fmt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::Error;
use crate::models::crm::{ContactInfo, CrmError, CrmReceipt, LeadPayload};
use crate::models::language::LanguageCode;
use crate::models::ticket::Ticket;

/// One CRM backend. Every backend honours the same contract so the
/// dispatcher can treat them uniformly.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Identifier used in config and in `Ticket::crm_sync_state`.
    fn name(&self) -> &str;

    fn is_configured(&self) -> bool {
        true
    }

    async fn push_lead(&self, lead: &LeadPayload) -> Result<CrmReceipt, CrmError>;

    /// Files `lead.transcript` against the record `lead_receipt` points at.
    /// `Ok(None)` when this CRM has no place for transcripts.
    async fn push_transcript(
        &self,
        _lead_receipt: &CrmReceipt,
        _lead: &LeadPayload,
    ) -> Result<Option<CrmReceipt>, CrmError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TicketOpened,
    TicketUpdated,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::TicketOpened => write!(f, "ticket_opened"),
            NotificationKind::TicketUpdated => write!(f, "ticket_updated"),
        }
    }
}

/// One alert for staff about a ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffNotice {
    pub kind: NotificationKind,
    pub ticket: Ticket,
    /// Contact details the patient gave, on new tickets.
    pub contact: Option<ContactInfo>,
    /// Staff note attached to a status change.
    pub notes: Option<String>,
}

impl StaffNotice {
    pub fn opened(ticket: Ticket, contact: ContactInfo) -> Self {
        Self {
            kind: NotificationKind::TicketOpened,
            ticket,
            contact: Some(contact),
            notes: None,
        }
    }

    pub fn updated(ticket: Ticket, notes: Option<String>) -> Self {
        Self {
            kind: NotificationKind::TicketUpdated,
            ticket,
            contact: None,
            notes,
        }
    }
}

/// Staff alerting (email bridge, chat webhook, pager...). Best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, notice: &StaffNotice) -> Result<(), Error>;
}

/// Best-effort machine translation, used when a language has no dedicated
/// sentiment model. `None` means "could not translate".
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: LanguageCode, to: LanguageCode) -> Option<String>;
}

/// Translator that never translates.
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, _text: &str, _from: LanguageCode, _to: LanguageCode) -> Option<String> {
        None
    }
}
