// src/repositories/postgres/mod.rs

pub mod conversations;
pub mod tickets;

pub use conversations::PostgresConversationRepository;
pub use tickets::PostgresTicketRepository;
