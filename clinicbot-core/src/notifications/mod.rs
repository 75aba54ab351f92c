//! src/notifications/mod.rs
//!
//! Staff alerting. Every notifier is best-effort: a failed alert is logged
//! and never affects the ticket or the patient reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use clinicbot_common::models::{ContactInfo, Priority};
use clinicbot_common::traits::{Notifier, StaffNotice};
use clinicbot_common::Error;

use crate::config::NotificationConfig;

/// Writes a log line per alert.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notice: &StaffNotice) -> Result<(), Error> {
        let ticket = &notice.ticket;
        let contact = notice.contact.as_ref().map(describe_contact).unwrap_or_default();
        let notes = notice.notes.as_deref().unwrap_or_default();
        match ticket.priority {
            Priority::Critical | Priority::High => warn!(
                "[staff] {} ticket={} priority={} status={} conversation={} summary={:?} contact={:?} notes={:?}",
                notice.kind, ticket.ticket_id, ticket.priority, ticket.status, ticket.conversation_id,
                ticket.summary, contact, notes
            ),
            _ => info!(
                "[staff] {} ticket={} priority={} status={} conversation={} contact={:?} notes={:?}",
                notice.kind, ticket.ticket_id, ticket.priority, ticket.status, ticket.conversation_id,
                contact, notes
            ),
        }
        Ok(())
    }
}

/// "Maria / maria@example.com / +5511987654321", skipping what is unknown.
pub fn describe_contact(contact: &ContactInfo) -> String {
    [&contact.name, &contact.email, &contact.phone]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" / ")
}

/// POSTs a JSON document to a staff webhook (chat room, pager bridge...).
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: url::Url,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, Error> {
        let url = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid webhook url '{}': {}", url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            url,
            timeout,
        })
    }

    pub fn payload(notice: &StaffNotice) -> serde_json::Value {
        let ticket = &notice.ticket;
        json!({
            "kind": notice.kind.to_string(),
            "ticket_id": ticket.ticket_id,
            "conversation_id": ticket.conversation_id,
            "status": ticket.status.to_string(),
            "priority": ticket.priority.to_string(),
            "summary": ticket.summary,
            "contact": notice.contact,
            "notes": notice.notes,
            "created_at": ticket.created_at,
            "sent_at": Utc::now(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, notice: &StaffNotice) -> Result<(), Error> {
        let response = self
            .http
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&Self::payload(notice))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Notifiers enabled by `config`.
pub fn from_config(config: &NotificationConfig) -> Vec<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if config.log {
        notifiers.push(Arc::new(LogNotifier));
    }
    if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
        match WebhookNotifier::new(url, config.timeout()) {
            Ok(n) => notifiers.push(Arc::new(n)),
            Err(e) => warn!("Staff webhook disabled: {}", e),
        }
    }
    notifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use clinicbot_common::models::Ticket;
    use uuid::Uuid;

    fn ticket(priority: Priority, summary: &str) -> Ticket {
        Ticket::new(Uuid::new_v4(), priority, summary, &BTreeSet::new())
    }

    #[test]
    fn webhook_payload_has_ticket_and_contact_fields() {
        let contact = ContactInfo {
            name: Some("Maria".into()),
            email: None,
            phone: Some("+5511987654321".into()),
        };
        let notice = StaffNotice::opened(ticket(Priority::Critical, "chest pain"), contact);
        let body = WebhookNotifier::payload(&notice);
        assert_eq!(body["kind"], "ticket_opened");
        assert_eq!(body["priority"], "critical");
        assert_eq!(body["status"], "open");
        assert_eq!(body["summary"], "chest pain");
        assert_eq!(body["contact"]["name"], "Maria");
        assert_eq!(body["contact"]["phone"], "+5511987654321");
        assert!(body["notes"].is_null());
    }

    #[test]
    fn update_payload_carries_staff_notes() {
        let notice = StaffNotice::updated(ticket(Priority::High, "x"), Some("family called".into()));
        let body = WebhookNotifier::payload(&notice);
        assert_eq!(body["kind"], "ticket_updated");
        assert_eq!(body["notes"], "family called");
        assert!(body["contact"].is_null());
    }

    #[test]
    fn contact_description_skips_unknown_fields() {
        let contact = ContactInfo {
            name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            phone: None,
        };
        assert_eq!(describe_contact(&contact), "Ana / ana@example.com");
        assert_eq!(describe_contact(&ContactInfo::default()), "");
    }

    #[test]
    fn bad_webhook_url_is_a_config_error() {
        assert!(matches!(
            WebhookNotifier::new("not a url", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn config_selects_notifiers() {
        let cfg = NotificationConfig {
            log: true,
            webhook_url: Some("https://hooks.example.com/staff".into()),
            timeout_secs: 2,
        };
        let names: Vec<String> = from_config(&cfg).iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["log", "webhook"]);
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notice = StaffNotice::updated(ticket(Priority::Low, "x"), None);
        assert!(LogNotifier.notify(&notice).await.is_ok());
    }
}
