//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that supports guaranteed delivery
//! to multiple subscribers via bounded MPSC queues.

use std::sync::Arc;
use futures_util::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::warn;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use clinicbot_ai::ProviderUnavailable;
use clinicbot_common::models::{
    LanguageCode, LeadPayload, SentimentResult, SyncReport, Ticket, TicketStatus,
};

/// Everything the triage pipeline announces to background workers.
#[derive(Debug, Clone)]
pub enum TriageEvent {
    /// A patient message was classified.
    MessageTriaged {
        conversation_id: Uuid,
        message_id: Uuid,
        language: LanguageCode,
        sentiment: SentimentResult,
        timestamp: DateTime<Utc>,
    },

    /// A new ticket was stored. `lead` is what the CRMs will receive.
    TicketOpened {
        ticket: Ticket,
        lead: LeadPayload,
    },

    /// Staff moved a ticket forward, optionally with a note.
    TicketStatusChanged {
        ticket: Ticket,
        from: TicketStatus,
        notes: Option<String>,
    },

    CrmSyncCompleted(SyncReport),

    /// The AI gateway answered with its fallback text.
    ProviderUnavailable {
        conversation_id: Uuid,
        details: ProviderUnavailable,
    },
}

impl TriageEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TriageEvent::MessageTriaged { .. } => "message.triaged",
            TriageEvent::TicketOpened { .. } => "ticket.opened",
            TriageEvent::TicketStatusChanged { .. } => "ticket.status_changed",
            TriageEvent::CrmSyncCompleted(_) => "crm.sync_completed",
            TriageEvent::ProviderUnavailable { .. } => "provider.unavailable",
        }
    }

    /// Ticket the event is about, if any.
    pub fn ticket_id(&self) -> Option<Uuid> {
        match self {
            TriageEvent::TicketOpened { ticket, .. } => Some(ticket.ticket_id),
            TriageEvent::TicketStatusChanged { ticket, .. } => Some(ticket.ticket_id),
            TriageEvent::CrmSyncCompleted(report) => Some(report.ticket_id),
            _ => None,
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<TriageEvent>` for guaranteed delivery.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, the channel is closed
///   and sending returns an error, which is ignored.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<TriageEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 1024;

impl EventBus {
    /// Create a new, empty event bus.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<TriageEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all subscribers. Sends run side by side, so a
    /// full queue only delays its own subscriber. Closed subscribers are pruned.
    pub async fn publish(&self, event: TriageEvent) {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        let sends = senders.iter().map(|s| s.send(event.clone()));
        let saw_closed = join_all(sends).await.iter().any(|r| r.is_err());
        if saw_closed {
            self.subscribers.lock().await.retain(|s| !s.is_closed());
        }
    }

    /// Like `publish`, but never waits on a full queue: subscribers that are
    /// behind miss this event. Returns how many subscribers received it.
    pub async fn try_publish(&self, event: TriageEvent) -> usize {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        let mut delivered = 0;
        let mut saw_closed = false;
        for s in senders {
            match s.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber queue full; dropped {} event", event.event_type());
                }
                Err(TrySendError::Closed(_)) => saw_closed = true,
            }
        }
        if saw_closed {
            self.subscribers.lock().await.retain(|s| !s.is_closed());
        }
        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    fn report_event(n: u128) -> TriageEvent {
        TriageEvent::CrmSyncCompleted(SyncReport::new(Uuid::from_u128(n)))
    }

    fn ticket_of(evt: &TriageEvent) -> u128 {
        evt.ticket_id().expect("event carries a ticket").as_u128()
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();

        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish(report_event(1)).await;

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");

        assert_eq!(evt1.event_type(), "crm.sync_completed");
        assert_eq!(ticket_of(&evt2), 1);
    }

    #[tokio::test]
    async fn test_backpressure_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await;

        // Fill the queue.
        bus.publish(report_event(1)).await;

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let first = rx.recv().await.expect("expected first message");
            let second = rx.recv().await.expect("expected second message");
            (first, second)
        });

        // Waits until the reader makes room.
        let second_publish = bus.publish(report_event(2));
        let result = timeout(Duration::from_millis(500), second_publish).await;
        assert!(result.is_ok(), "publish should eventually unblock");

        let (evt1, evt2) = handle.await.unwrap();
        assert_eq!(ticket_of(&evt1), 1);
        assert_eq!(ticket_of(&evt2), 2);
    }

    #[tokio::test]
    async fn test_try_publish_skips_full_queues() {
        let bus = EventBus::new();
        let mut stuck = bus.subscribe(Some(1)).await;
        let mut live = bus.subscribe(Some(8)).await;

        assert_eq!(bus.try_publish(report_event(1)).await, 2);
        let second = timeout(Duration::from_millis(100), bus.try_publish(report_event(2))).await;
        assert_eq!(second.expect("try_publish must not wait"), 1);

        assert_eq!(ticket_of(&stuck.recv().await.unwrap()), 1);
        assert!(stuck.try_recv().is_err());
        assert_eq!(ticket_of(&live.recv().await.unwrap()), 1);
        assert_eq!(ticket_of(&live.recv().await.unwrap()), 2);
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_hold_back_others() {
        let bus = Arc::new(EventBus::new());
        let _stuck = bus.subscribe(Some(1)).await;
        let mut live = bus.subscribe(Some(8)).await;

        bus.publish(report_event(1)).await;
        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(report_event(2)).await })
        };

        assert_eq!(ticket_of(&live.recv().await.unwrap()), 1);
        let second = timeout(Duration::from_millis(200), live.recv()).await;
        assert_eq!(ticket_of(&second.expect("live subscriber served").unwrap()), 2);
        assert!(!publisher.is_finished());
        publisher.abort();
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Some(1)).await;
        let mut live = bus.subscribe(Some(4)).await;
        drop(rx);

        bus.publish(report_event(7)).await;

        assert_eq!(bus.subscriber_count().await, 1);
        assert_eq!(ticket_of(&live.recv().await.unwrap()), 7);
    }

    #[tokio::test]
    async fn test_shutdown_flag() {
        let bus = EventBus::new();
        let mut watcher = bus.shutdown_rx.clone();
        assert!(!bus.is_shutdown());
        bus.shutdown();
        watcher.changed().await.unwrap();
        assert!(*watcher.borrow());
        assert!(bus.is_shutdown());
    }
}
