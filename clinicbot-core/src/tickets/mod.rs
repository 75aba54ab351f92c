//! src/tickets/mod.rs
//!
//! Ticket policy (when to open, which priority, which moves are legal) and
//! the manager that applies it against the ticket store.

pub mod manager;

use chrono::Utc;
use tracing::error;

use clinicbot_common::models::{Conversation, Priority, SentimentResult, Ticket, TicketStatus};
use clinicbot_common::Error;

pub use manager::TicketManager;

pub const DEFAULT_HIGH_URGENCY_THRESHOLD: f64 = 0.7;
const MEDIUM_URGENCY_THRESHOLD: f64 = 0.4;

/// Open a ticket when the message is urgent enough (or hit an
/// always-escalate keyword) and the conversation has no active ticket.
pub fn should_open_ticket(sentiment: &SentimentResult, conversation: &Conversation, threshold: f64) -> bool {
    if conversation.has_active_ticket() {
        return false;
    }
    sentiment.always_escalate || sentiment.urgency_score >= threshold
}

/// `high_threshold` is the same threshold that opens tickets, so a High
/// priority always comes with a ticket.
pub fn assign_priority(sentiment: &SentimentResult, high_threshold: f64) -> Priority {
    if sentiment.always_escalate {
        Priority::Critical
    } else if sentiment.urgency_score >= high_threshold {
        Priority::High
    } else if sentiment.urgency_score >= MEDIUM_URGENCY_THRESHOLD {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Forward-only moves: Open -> InProgress -> Resolved, and Open -> Resolved.
pub fn is_valid_transition(from: TicketStatus, to: TicketStatus) -> bool {
    matches!(
        (from, to),
        (TicketStatus::Open, TicketStatus::InProgress)
            | (TicketStatus::Open, TicketStatus::Resolved)
            | (TicketStatus::InProgress, TicketStatus::Resolved)
    )
}

/// Returns the ticket moved to `new_status`, stamped with the current time.
pub fn transition(ticket: &Ticket, new_status: TicketStatus) -> Result<Ticket, Error> {
    if !is_valid_transition(ticket.status, new_status) {
        error!(
            "Rejected ticket transition {} -> {} for ticket {}",
            ticket.status, new_status, ticket.ticket_id
        );
        return Err(Error::InvalidTransition {
            from: ticket.status,
            to: new_status,
        });
    }
    let mut moved = ticket.clone();
    moved.status = new_status;
    moved.last_updated = Utc::now();
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use clinicbot_common::models::{Channel, LanguageCode};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn sentiment(urgency: f64, always: bool) -> SentimentResult {
        let mut s = SentimentResult::neutral();
        s.urgency_score = urgency;
        s.always_escalate = always;
        s
    }

    fn conversation() -> Conversation {
        Conversation::new(Uuid::new_v4(), LanguageCode::En, Channel::WebWidget)
    }

    #[test]
    fn opens_once_then_stops() {
        let mut conv = conversation();
        let urgent = sentiment(0.8, false);
        assert!(should_open_ticket(&urgent, &conv, 0.7));

        conv.active_ticket = Some(Ticket::new(conv.conversation_id, Priority::High, "x", &BTreeSet::new()));
        assert!(!should_open_ticket(&urgent, &conv, 0.7));
    }

    #[test]
    fn resolved_ticket_does_not_block_a_new_one() {
        let mut conv = conversation();
        let mut old = Ticket::new(conv.conversation_id, Priority::High, "x", &BTreeSet::new());
        old.status = TicketStatus::Resolved;
        conv.active_ticket = Some(old);
        assert!(should_open_ticket(&sentiment(0.9, false), &conv, 0.7));
    }

    #[test]
    fn always_escalate_ignores_threshold() {
        assert!(should_open_ticket(&sentiment(0.1, true), &conversation(), 0.95));
        assert!(!should_open_ticket(&sentiment(0.69, false), &conversation(), 0.7));
    }

    #[test]
    fn priority_buckets() {
        let high = DEFAULT_HIGH_URGENCY_THRESHOLD;
        assert_eq!(assign_priority(&sentiment(1.0, true), high), Priority::Critical);
        assert_eq!(assign_priority(&sentiment(0.7, false), high), Priority::High);
        assert_eq!(assign_priority(&sentiment(0.4, false), high), Priority::Medium);
        assert_eq!(assign_priority(&sentiment(0.39, false), high), Priority::Low);
        assert_eq!(assign_priority(&sentiment(0.0, false), high), Priority::Low);
    }

    #[test]
    fn raised_threshold_moves_the_high_bucket() {
        let s = sentiment(0.75, false);
        assert_eq!(assign_priority(&s, 0.8), Priority::Medium);
        assert!(!should_open_ticket(&s, &conversation(), 0.8));
        assert_eq!(assign_priority(&sentiment(0.85, false), 0.8), Priority::High);
    }

    #[test]
    fn transitions_only_move_forward() {
        use TicketStatus::*;
        let ticket = Ticket::new(Uuid::new_v4(), Priority::Low, "x", &BTreeSet::new());

        let in_progress = transition(&ticket, InProgress).unwrap();
        assert_eq!(in_progress.status, InProgress);
        assert!(in_progress.last_updated >= ticket.last_updated);

        let resolved = transition(&in_progress, Resolved).unwrap();
        assert!(transition(&ticket, Resolved).is_ok());

        for (from, to) in [(&resolved, Open), (&resolved, InProgress), (&in_progress, Open), (&ticket, Open)] {
            match transition(from, to) {
                Err(Error::InvalidTransition { from: f, to: t }) => {
                    assert_eq!(f, from.status);
                    assert_eq!(t, to);
                }
                other => panic!("expected InvalidTransition, got {:?}", other.map(|t| t.status)),
            }
        }
    }

    fn any_status() -> impl Strategy<Value = TicketStatus> {
        prop_oneof![
            Just(TicketStatus::Open),
            Just(TicketStatus::InProgress),
            Just(TicketStatus::Resolved),
        ]
    }

    proptest! {
        #[test]
        fn transitions_follow_status_order(from in any_status(), to in any_status()) {
            prop_assert_eq!(is_valid_transition(from, to), from < to);

            let mut ticket = Ticket::new(Uuid::new_v4(), Priority::Low, "x", &BTreeSet::new());
            ticket.status = from;
            match transition(&ticket, to) {
                Ok(moved) => {
                    prop_assert!(from < to);
                    prop_assert_eq!(moved.status, to);
                }
                Err(Error::InvalidTransition { from: f, to: t }) => {
                    prop_assert!(from >= to);
                    prop_assert_eq!((f, t), (from, to));
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
