pub mod crm_resync;
pub mod crm_sync;
pub mod notifications;

pub use crm_resync::{resync_failed_once, spawn_crm_resync_task, ResyncContext};
pub use crm_sync::{spawn_crm_sync_worker, sync_ticket};
pub use notifications::spawn_notification_worker;
