//! src/tasks/notifications.rs
//!
//! Forwards ticket events to every staff notifier. Each alert runs on its
//! own task under `notify_timeout`, so a stuck notifier never stops the
//! worker from draining its queue.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use clinicbot_common::traits::{Notifier, StaffNotice};

use crate::eventbus::{EventBus, TriageEvent};

pub async fn spawn_notification_worker(
    event_bus: Arc<EventBus>,
    notifiers: Vec<Arc<dyn Notifier>>,
    notify_timeout: Duration,
) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe(None).await;
    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    let notifiers: Arc<[Arc<dyn Notifier>]> = notifiers.into();

    tokio::spawn(async move {
        let mut in_flight = JoinSet::new();
        info!("Notification worker started with {} notifier(s)", notifiers.len());
        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if let Some(notice) = notice_for(event) {
                                in_flight.spawn(dispatch(notifiers.clone(), notice, notify_timeout));
                            }
                        }
                        None => break,
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Notification worker shutting down => break from loop.");
                        break;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("Notification task panicked: {:?}", e);
                    }
                }
            }
        }

        while let Ok(event) = rx.try_recv() {
            if let Some(notice) = notice_for(event) {
                in_flight.spawn(dispatch(notifiers.clone(), notice, notify_timeout));
            }
        }
        drop(rx);
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Notification task panicked: {:?}", e);
            }
        }
        info!("Notification worker exited completely.");
    })
}

/// Staff-facing events only; the rest is ignored.
fn notice_for(event: TriageEvent) -> Option<StaffNotice> {
    match event {
        TriageEvent::TicketOpened { ticket, lead } => Some(StaffNotice::opened(ticket, lead.contact)),
        TriageEvent::TicketStatusChanged { ticket, notes, .. } => Some(StaffNotice::updated(ticket, notes)),
        _ => None,
    }
}

async fn dispatch(notifiers: Arc<[Arc<dyn Notifier>]>, notice: StaffNotice, notify_timeout: Duration) {
    let notice = &notice;
    let sends = notifiers.iter().map(|n| async move {
        match tokio::time::timeout(notify_timeout, n.notify(notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                "Notifier '{}' failed for ticket {}: {}",
                n.name(),
                notice.ticket.ticket_id,
                e
            ),
            Err(_) => warn!(
                "Notifier '{}' timed out after {}ms for ticket {}",
                n.name(),
                notify_timeout.as_millis(),
                notice.ticket.ticket_id
            ),
        }
    });
    join_all(sends).await;
}
