//! src/crm/dispatcher.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use clinicbot_common::models::{
    CrmError, CrmReceipt, CrmSyncState, LeadPayload, SyncOutcome, SyncReport, Ticket,
};
use clinicbot_common::traits::CrmClient;

use crate::config::CrmConfig;

use super::clients;
use super::retry::{retry_with_backoff, RetryPolicy};

/// Fans a lead out to every requested CRM. Targets are independent: one
/// failing CRM never blocks or undoes the others.
pub struct CrmDispatcher {
    clients: HashMap<String, Arc<dyn CrmClient>>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl CrmDispatcher {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            policy,
            timeout,
        }
    }

    pub fn from_config(config: &CrmConfig) -> Self {
        let mut dispatcher = Self::new(
            RetryPolicy::new(config.max_attempts, config.base_backoff()),
            config.timeout(),
        );
        for client in clients::from_config(config) {
            dispatcher.register(client);
        }
        dispatcher
    }

    pub fn register(&mut self, client: Arc<dyn CrmClient>) {
        let name = client.name().to_string();
        if !client.is_configured() {
            warn!("CRM client '{}' registered without credentials", name);
        }
        if self.clients.insert(name.clone(), client).is_some() {
            debug!("Replaced CRM client '{}'", name);
        }
    }

    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Pushes `lead` to each target concurrently. Partial success is a normal
    /// report, never an error.
    pub async fn sync(&self, lead: &LeadPayload, targets: &[String]) -> SyncReport {
        let unique: BTreeSet<&String> = targets.iter().collect();
        let pushes = unique.into_iter().map(move |target| async move {
            let outcome = self.sync_one(lead, target).await;
            (target.clone(), outcome)
        });

        let mut report = SyncReport::new(lead.ticket_id);
        report.outcomes = join_all(pushes).await.into_iter().collect();

        info!(
            "CRM sync for ticket {}: {} synced, {} failed ({:?})",
            lead.ticket_id,
            report.synced_count(),
            report.failed_count(),
            report.status()
        );
        report
    }

    /// Re-attempts only the targets `ticket` records as failed.
    pub async fn resync_failed(&self, ticket: &Ticket, lead: &LeadPayload) -> SyncReport {
        let failed: Vec<String> = ticket.failed_targets().into_iter().collect();
        if failed.is_empty() {
            return SyncReport::new(ticket.ticket_id);
        }
        debug!("Re-syncing ticket {} to {:?}", ticket.ticket_id, failed);
        self.sync(lead, &failed).await
    }

    async fn sync_one(&self, lead: &LeadPayload, target: &str) -> SyncOutcome {
        let Some(client) = self.clients.get(target) else {
            warn!("No CRM client named '{}'", target);
            return SyncOutcome::Failed {
                error: CrmError::NotConfigured(format!("unknown CRM target '{}'", target)),
                attempts: 0,
                failed_at: Utc::now(),
            };
        };

        let operation = format!("push_lead:{}", target);
        let (result, attempts) = retry_with_backoff(&operation, &self.policy, move || async move {
            match tokio::time::timeout(self.timeout, client.push_lead(lead)).await {
                Ok(r) => r,
                Err(_) => Err(CrmError::Network(format!(
                    "{} timed out after {}ms",
                    target,
                    self.timeout.as_millis()
                ))),
            }
        })
        .await;

        match result {
            Ok(receipt) => {
                debug!("Ticket {} synced to {} as {}", lead.ticket_id, target, receipt.external_id);
                let transcript_id = self.push_transcript(client.as_ref(), &receipt, lead).await;
                SyncOutcome::Synced {
                    external_id: receipt.external_id,
                    attempts,
                    transcript_id,
                }
            }
            Err(error) => {
                warn!(
                    "Ticket {} failed to sync to {} after {} attempt(s): {}",
                    lead.ticket_id, target, attempts, error
                );
                SyncOutcome::Failed {
                    error,
                    attempts,
                    failed_at: Utc::now(),
                }
            }
        }
    }

    /// Files the chat transcript next to a synced lead. Failure leaves the
    /// lead synced; the note id is returned when the CRM took one.
    async fn push_transcript(
        &self,
        client: &dyn CrmClient,
        receipt: &CrmReceipt,
        lead: &LeadPayload,
    ) -> Option<String> {
        if lead.transcript.trim().is_empty() {
            return None;
        }
        let operation = format!("push_transcript:{}", client.name());
        let (result, _) = retry_with_backoff(&operation, &self.policy, move || async move {
            match tokio::time::timeout(self.timeout, client.push_transcript(receipt, lead)).await {
                Ok(r) => r,
                Err(_) => Err(CrmError::Network(format!("{} transcript timed out", client.name()))),
            }
        })
        .await;

        match result {
            Ok(Some(note)) => {
                debug!("Transcript for ticket {} filed in {} as {}", lead.ticket_id, client.name(), note.external_id);
                Some(note.external_id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Ticket {} synced to {} but the transcript was not filed: {}",
                    lead.ticket_id,
                    client.name(),
                    e
                );
                None
            }
        }
    }
}

/// Sync states a report implies, keyed by target.
pub fn report_states(report: &SyncReport) -> BTreeMap<String, CrmSyncState> {
    report
        .outcomes
        .iter()
        .map(|(target, outcome)| {
            let state = if outcome.is_synced() {
                CrmSyncState::Synced
            } else {
                CrmSyncState::Failed
            };
            (target.clone(), state)
        })
        .collect()
}

pub fn apply_report(ticket: &mut Ticket, report: &SyncReport) {
    ticket.crm_sync_state.extend(report_states(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use clinicbot_common::models::{Channel, ContactInfo, LanguageCode, Priority};
    use uuid::Uuid;

    struct Flaky {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl CrmClient for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn push_lead(&self, _lead: &LeadPayload) -> Result<CrmReceipt, CrmError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(CrmError::Network("reset".into()));
            }
            Ok(CrmReceipt { external_id: "f-1".into() })
        }
    }

    struct Slow;

    #[async_trait]
    impl CrmClient for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn push_lead(&self, _lead: &LeadPayload) -> Result<CrmReceipt, CrmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(CrmReceipt { external_id: "never".into() })
        }
    }

    fn lead() -> LeadPayload {
        LeadPayload {
            ticket_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            priority: Priority::High,
            urgency_score: 0.8,
            language: LanguageCode::En,
            channel: Channel::Cli,
            message: "help".into(),
            contact: ContactInfo::default(),
            source: "Chatbot".into(),
            transcript: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success_counts_attempts() {
        let mut d = CrmDispatcher::new(RetryPolicy::new(3, Duration::from_millis(5)), Duration::from_secs(1));
        d.register(Arc::new(Flaky { failures_left: AtomicU32::new(1) }));

        let report = d.sync(&lead(), &["flaky".to_string()]).await;
        assert_eq!(
            report.outcomes["flaky"],
            SyncOutcome::Synced { external_id: "f-1".into(), attempts: 2, transcript_id: None }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_client_times_out_as_network_error() {
        let mut d = CrmDispatcher::new(RetryPolicy::new(2, Duration::from_millis(5)), Duration::from_millis(100));
        d.register(Arc::new(Slow));

        let report = d.sync(&lead(), &["slow".to_string()]).await;
        match &report.outcomes["slow"] {
            SyncOutcome::Failed { error: CrmError::Network(_), attempts, .. } => assert_eq!(*attempts, 2),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_target_fails_without_attempts() {
        let d = CrmDispatcher::new(RetryPolicy::none(), Duration::from_secs(1));
        let report = d.sync(&lead(), &["zoho".to_string(), "zoho".to_string()]).await;
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(
            report.outcomes["zoho"],
            SyncOutcome::Failed { error: CrmError::NotConfigured(_), attempts: 0, .. }
        ));
    }

    #[test]
    fn applying_a_report_overwrites_only_reported_targets() {
        let targets: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        let mut ticket = Ticket::new(Uuid::new_v4(), Priority::High, "x", &targets);
        let mut report = SyncReport::new(ticket.ticket_id);
        report.outcomes.insert("a".into(), SyncOutcome::Synced { external_id: "1".into(), attempts: 1, transcript_id: None });

        apply_report(&mut ticket, &report);
        assert_eq!(ticket.crm_sync_state["a"], CrmSyncState::Synced);
        assert_eq!(ticket.crm_sync_state["b"], CrmSyncState::Pending);
    }
}
