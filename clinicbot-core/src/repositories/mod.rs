// src/repositories/mod.rs
//
// Storage adapters behind the `ConversationRepository` and
// `TicketRepository` traits from clinicbot-common.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryConversationRepository, InMemoryTicketRepository};
pub use postgres::{PostgresConversationRepository, PostgresTicketRepository};
