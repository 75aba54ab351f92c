//! src/crm/mod.rs
//!
//! Lead delivery to external CRMs.

pub mod clients;
pub mod dispatcher;
pub mod lead;
pub mod retry;

pub use dispatcher::{apply_report, report_states, CrmDispatcher};
pub use lead::{build_lead, contact_from_conversation, extract_contact};
pub use retry::{retry_with_backoff, RetryPolicy};
