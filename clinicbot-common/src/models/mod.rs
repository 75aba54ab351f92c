// File: clinicbot-common/src/models/mod.rs
pub mod conversation;
pub mod crm;
pub mod language;
pub mod message;
pub mod sentiment;
pub mod ticket;

pub use conversation::Conversation;
pub use crm::{ContactInfo, CrmError, CrmReceipt, LeadPayload, SyncOutcome, SyncReport, SyncStatus};
pub use language::LanguageCode;
pub use message::{Channel, InboundMessage, Message, Sender};
pub use sentiment::{KeywordCategory, SentimentResult, Tone};
pub use ticket::{CrmSyncState, Priority, Ticket, TicketStatus};
