//! src/tasks/crm_resync.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use clinicbot_common::models::{Channel, Conversation, LanguageCode, LeadPayload, Ticket};
use clinicbot_common::traits::{ConversationRepository, TicketRepository};
use clinicbot_common::Error;

use crate::crm::{build_lead, CrmDispatcher};
use crate::eventbus::EventBus;

use super::crm_sync::persist_and_announce;

/// Everything one re-sync pass needs.
#[derive(Clone)]
pub struct ResyncContext {
    pub event_bus: Arc<EventBus>,
    pub dispatcher: Arc<CrmDispatcher>,
    pub tickets: Arc<dyn TicketRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub batch: i64,
}

/// Rebuilds the lead from the stored conversation. Tickets whose
/// conversation vanished fall back to the ticket summary.
async fn lead_for(ctx: &ResyncContext, ticket: &Ticket) -> Result<LeadPayload, Error> {
    let conversation = match ctx.conversations.get_conversation(ticket.conversation_id).await? {
        Some(conversation) => conversation,
        None => {
            debug!(
                "CRM re-sync: conversation {} gone, using ticket summary",
                ticket.conversation_id
            );
            Conversation::new(ticket.conversation_id, LanguageCode::default(), Channel::WebWidget)
        }
    };
    let message = conversation
        .patient_texts()
        .last()
        .map(|t| t.to_string())
        .unwrap_or_else(|| ticket.summary.clone());
    Ok(build_lead(ticket, &conversation, None, &message))
}

/// One pass over tickets with failed targets. Returns how many tickets
/// were retried.
pub async fn resync_failed_once(ctx: &ResyncContext) -> Result<usize, Error> {
    let failed = ctx.tickets.list_with_failed_sync(ctx.batch).await?;
    if failed.is_empty() {
        debug!("CRM re-sync: nothing to retry");
        return Ok(0);
    }

    info!("CRM re-sync: retrying {} ticket(s)", failed.len());
    let mut retried = 0;
    for ticket in &failed {
        let lead = match lead_for(ctx, ticket).await {
            Ok(lead) => lead,
            Err(e) => {
                warn!("CRM re-sync: skipping ticket {}: {}", ticket.ticket_id, e);
                continue;
            }
        };
        let report = ctx.dispatcher.resync_failed(ticket, &lead).await;
        persist_and_announce(&ctx.event_bus, ctx.tickets.as_ref(), &report).await;
        retried += 1;
    }
    Ok(retried)
}

/// Spawns a background task that periodically re-attempts failed CRM
/// targets. Stops when the bus shuts down.
pub fn spawn_crm_resync_task(ctx: ResyncContext, interval: Duration) -> JoinHandle<()> {
    let mut shutdown_rx = ctx.event_bus.shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    if let Err(e) = resync_failed_once(&ctx).await {
                        error!("CRM re-sync pass failed: {}", e);
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("CRM re-sync task shutting down.");
                        break;
                    }
                }
            }
        }
    })
}
