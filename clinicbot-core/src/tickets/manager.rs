//! src/tickets/manager.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use clinicbot_common::models::{Conversation, SentimentResult, Ticket, TicketStatus};
use clinicbot_common::traits::TicketRepository;
use clinicbot_common::Error;

use crate::eventbus::{EventBus, TriageEvent};

use super::{assign_priority, should_open_ticket, transition};

/// Opens and moves tickets. Creation for one conversation is serialized by
/// an in-process lock; the store also refuses a second active ticket.
pub struct TicketManager {
    repo: Arc<dyn TicketRepository>,
    event_bus: Arc<EventBus>,
    high_urgency_threshold: f64,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TicketManager {
    pub fn new(repo: Arc<dyn TicketRepository>, event_bus: Arc<EventBus>, high_urgency_threshold: f64) -> Self {
        Self {
            repo,
            event_bus,
            high_urgency_threshold,
            locks: DashMap::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.high_urgency_threshold
    }

    pub fn should_open_ticket(&self, sentiment: &SentimentResult, conversation: &Conversation) -> bool {
        should_open_ticket(sentiment, conversation, self.high_urgency_threshold)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn lock_for(&self, conversation_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn active_ticket(&self, conversation_id: Uuid) -> Result<Option<Ticket>, Error> {
        self.repo.active_for_conversation(conversation_id).await
    }

    /// Creates a ticket when policy says so. Returns `None` when no ticket
    /// was needed or another request created one first.
    pub async fn open_if_needed(
        &self,
        conversation: &Conversation,
        sentiment: &SentimentResult,
        summary: &str,
        crm_targets: &[String],
    ) -> Result<Option<Ticket>, Error> {
        // Cheap pre-check on the caller's snapshot.
        if !sentiment.always_escalate && sentiment.urgency_score < self.high_urgency_threshold {
            return Ok(None);
        }

        let lock = self.lock_for(conversation.conversation_id);
        let _guard = lock.lock().await;

        let mut current = conversation.clone();
        current.active_ticket = self.repo.active_for_conversation(conversation.conversation_id).await?;
        if !self.should_open_ticket(sentiment, &current) {
            debug!(
                "Conversation {} already has an active ticket; not opening another",
                conversation.conversation_id
            );
            return Ok(None);
        }

        let targets: BTreeSet<String> = crm_targets.iter().cloned().collect();
        let ticket = Ticket::new(
            conversation.conversation_id,
            assign_priority(sentiment, self.high_urgency_threshold),
            summary,
            &targets,
        );

        match self.repo.create_unless_active(&ticket).await {
            Ok(()) => {
                info!(
                    "Opened ticket {} ({}) for conversation {} urgency={:.2}",
                    ticket.ticket_id, ticket.priority, ticket.conversation_id, sentiment.urgency_score
                );
                Ok(Some(ticket))
            }
            Err(Error::DuplicateActiveTicket(conv)) => {
                warn!("Store rejected duplicate active ticket for conversation {}", conv);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Staff action. Persists the move (and the note, if any) and announces it.
    pub async fn update_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
        notes: Option<String>,
    ) -> Result<Ticket, Error> {
        let ticket = self
            .repo
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {}", ticket_id)))?;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let mut moved = transition(&ticket, status)?;
        self.repo
            .update_status(ticket_id, ticket.status, moved.status, notes.as_deref(), moved.last_updated)
            .await?;
        if notes.is_some() {
            moved.notes = notes.clone();
        }

        info!("Ticket {} moved {} -> {}", ticket_id, ticket.status, moved.status);
        let bus = self.event_bus.clone();
        let event = TriageEvent::TicketStatusChanged {
            ticket: moved.clone(),
            from: ticket.status,
            notes,
        };
        tokio::spawn(async move {
            bus.publish(event).await;
        });

        if !moved.is_active() {
            // Only drop a lock nobody is holding or waiting on.
            self.locks
                .remove_if(&moved.conversation_id, |_, lock| Arc::strong_count(lock) == 1);
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicbot_common::models::{Channel, LanguageCode};

    use crate::repositories::InMemoryTicketRepository;

    fn urgent() -> SentimentResult {
        SentimentResult {
            urgency_score: 0.95,
            ..SentimentResult::neutral()
        }
    }

    fn setup() -> (TicketManager, Conversation) {
        let mgr = TicketManager::new(
            Arc::new(InMemoryTicketRepository::new()),
            Arc::new(EventBus::new()),
            0.7,
        );
        let conv = Conversation::new(Uuid::new_v4(), LanguageCode::En, Channel::Cli);
        (mgr, conv)
    }

    #[tokio::test]
    async fn closing_a_ticket_frees_an_idle_lock() {
        let (mgr, conv) = setup();
        let ticket = mgr.open_if_needed(&conv, &urgent(), "help", &[]).await.unwrap().unwrap();
        assert_eq!(mgr.lock_count(), 1);

        mgr.update_status(ticket.ticket_id, TicketStatus::Resolved, None).await.unwrap();
        assert_eq!(mgr.lock_count(), 0);
    }

    #[tokio::test]
    async fn closing_a_ticket_keeps_a_lock_in_use() {
        let (mgr, conv) = setup();
        let ticket = mgr.open_if_needed(&conv, &urgent(), "help", &[]).await.unwrap().unwrap();

        let held = mgr.lock_for(conv.conversation_id);
        let _guard = held.lock().await;
        mgr.update_status(ticket.ticket_id, TicketStatus::Resolved, None).await.unwrap();

        // A newcomer must queue on the same mutex, not a fresh one.
        assert_eq!(mgr.lock_count(), 1);
        let newcomer = mgr.lock_for(conv.conversation_id);
        assert!(Arc::ptr_eq(&held, &newcomer));
        assert!(newcomer.try_lock().is_err());
    }
}
