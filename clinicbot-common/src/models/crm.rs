// File: clinicbot-common/src/models/crm.rs

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::language::LanguageCode;
use crate::models::message::Channel;
use crate::models::ticket::Priority;

/// Contact details a patient volunteered during the chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// What every CRM receives for a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadPayload {
    pub ticket_id: Uuid,
    pub conversation_id: Uuid,
    pub priority: Priority,
    pub urgency_score: f64,
    pub language: LanguageCode,
    pub channel: Channel,
    pub message: String,
    pub contact: ContactInfo,
    pub source: String,
    /// Chat transcript filed as a note/activity next to the lead. Empty
    /// means no transcript is pushed.
    #[serde(default)]
    pub transcript: String,
}

/// Acknowledgement from a CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmReceipt {
    pub external_id: String,
}

/// Typed failure from a single CRM push.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrmError {
    #[error("CRM not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Rejected by CRM: {0}")]
    Rejected(String),
}

impl CrmError {
    /// Transient failures worth another attempt within the same sync cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrmError::Network(_) | CrmError::RateLimited(_))
    }
}

/// Result of syncing one ticket to one CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced {
        external_id: String,
        attempts: u32,
        /// Id of the transcript note, when the CRM took one.
        #[serde(default)]
        transcript_id: Option<String>,
    },
    Failed {
        error: CrmError,
        attempts: u32,
        failed_at: DateTime<Utc>,
    },
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No targets were requested.
    Empty,
    Complete,
    Partial,
    Failed,
}

/// Per-target outcomes of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub ticket_id: Uuid,
    pub outcomes: BTreeMap<String, SyncOutcome>,
}

impl SyncReport {
    pub fn new(ticket_id: Uuid) -> Self {
        Self {
            ticket_id,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn synced_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_synced()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.synced_count()
    }

    pub fn status(&self) -> SyncStatus {
        match (self.outcomes.len(), self.synced_count()) {
            (0, _) => SyncStatus::Empty,
            (total, ok) if ok == total => SyncStatus::Complete,
            (_, 0) => SyncStatus::Failed,
            _ => SyncStatus::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> SyncOutcome {
        SyncOutcome::Failed {
            error: CrmError::Network("reset".into()),
            attempts: 3,
            failed_at: Utc::now(),
        }
    }

    fn synced() -> SyncOutcome {
        SyncOutcome::Synced { external_id: "42".into(), attempts: 1, transcript_id: None }
    }

    #[test]
    fn report_status_reflects_mix() {
        let mut report = SyncReport::new(Uuid::new_v4());
        assert_eq!(report.status(), SyncStatus::Empty);

        report.outcomes.insert("hubspot".into(), synced());
        assert_eq!(report.status(), SyncStatus::Complete);

        report.outcomes.insert("pipedrive".into(), failed());
        assert_eq!(report.status(), SyncStatus::Partial);
        assert_eq!(report.synced_count(), 1);
        assert_eq!(report.failed_count(), 1);

        report.outcomes.remove("hubspot");
        assert_eq!(report.status(), SyncStatus::Failed);
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(CrmError::RateLimited("429".into()).is_retryable());
        assert!(CrmError::Network("timeout".into()).is_retryable());
        assert!(!CrmError::Auth("401".into()).is_retryable());
        assert!(!CrmError::MalformedPayload("bad".into()).is_retryable());
    }
}
