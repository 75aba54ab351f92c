pub mod api;
pub mod repository_traits;

pub use api::{CrmClient, NoopTranslator, NotificationKind, Notifier, StaffNotice, Translator};
pub use repository_traits::{ConversationRepository, TicketRepository};
