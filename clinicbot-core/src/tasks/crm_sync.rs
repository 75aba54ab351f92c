//! src/tasks/crm_sync.rs
//!
//! Pushes every newly opened ticket to its CRMs and records the outcome.
//! Each ticket syncs on its own task so a slow CRM never stalls the queue;
//! on shutdown the queue is drained and in-flight syncs are awaited.

use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

use clinicbot_common::models::{LeadPayload, SyncReport, Ticket};
use clinicbot_common::traits::TicketRepository;

use crate::crm::{report_states, CrmDispatcher};
use crate::eventbus::{EventBus, TriageEvent};

/// Subscribes before returning, so no `TicketOpened` published after this
/// call is missed.
pub async fn spawn_crm_sync_worker(
    event_bus: Arc<EventBus>,
    dispatcher: Arc<CrmDispatcher>,
    tickets: Arc<dyn TicketRepository>,
) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe(None).await;
    let mut shutdown_rx = event_bus.shutdown_rx.clone();

    tokio::spawn(async move {
        let mut in_flight = JoinSet::new();
        info!("CRM sync worker started");

        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(TriageEvent::TicketOpened { ticket, lead }) => {
                            in_flight.spawn(sync_ticket(
                                event_bus.clone(),
                                dispatcher.clone(),
                                tickets.clone(),
                                ticket,
                                lead,
                            ));
                        }
                        Some(_) => {}
                        None => {
                            info!("CRM sync channel closed => break from loop.");
                            break;
                        }
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("CRM sync worker shutting down => break from loop.");
                        break;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("CRM sync task panicked: {:?}", e);
                    }
                }
            }
        }

        while let Ok(event) = rx.try_recv() {
            if let TriageEvent::TicketOpened { ticket, lead } = event {
                in_flight.spawn(sync_ticket(
                    event_bus.clone(),
                    dispatcher.clone(),
                    tickets.clone(),
                    ticket,
                    lead,
                ));
            }
        }
        // Nothing reads this receiver any more.
        drop(rx);
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("CRM sync task panicked: {:?}", e);
            }
        }
        info!("CRM sync worker exited completely.");
    })
}

/// Syncs one ticket to the targets it was opened with.
pub async fn sync_ticket(
    event_bus: Arc<EventBus>,
    dispatcher: Arc<CrmDispatcher>,
    tickets: Arc<dyn TicketRepository>,
    ticket: Ticket,
    lead: LeadPayload,
) -> SyncReport {
    let targets: Vec<String> = ticket.crm_sync_state.keys().cloned().collect();
    let report = dispatcher.sync(&lead, &targets).await;
    persist_and_announce(&event_bus, tickets.as_ref(), &report).await;
    report
}

pub(crate) async fn persist_and_announce(
    event_bus: &EventBus,
    tickets: &dyn TicketRepository,
    report: &SyncReport,
) {
    if report.outcomes.is_empty() {
        return;
    }
    if let Err(e) = tickets
        .update_crm_sync_state(report.ticket_id, &report_states(report))
        .await
    {
        error!("Could not store CRM sync state for ticket {}: {}", report.ticket_id, e);
    }
    event_bus.try_publish(TriageEvent::CrmSyncCompleted(report.clone())).await;
}

