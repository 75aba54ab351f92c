// File: clinicbot-common/src/models/ticket.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket status. Ordered: a ticket only ever moves to a greater status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    /// Open and InProgress tickets count against the one-per-conversation rule.
    pub fn is_active(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::InProgress)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::InProgress => write!(f, "in_progress"),
            TicketStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" | "inprogress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Per-CRM delivery state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmSyncState {
    Pending,
    Synced,
    Failed,
}

impl fmt::Display for CrmSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrmSyncState::Pending => write!(f, "pending"),
            CrmSyncState::Synced => write!(f, "synced"),
            CrmSyncState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for CrmSyncState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrmSyncState::Pending),
            "synced" => Ok(CrmSyncState::Synced),
            "failed" => Ok(CrmSyncState::Failed),
            _ => Err(format!("Unknown CRM sync state: {}", s)),
        }
    }
}

/// A support ticket raised for staff follow-up. Never deleted; closed by
/// moving to `Resolved`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: Uuid,
    pub conversation_id: Uuid,
    pub status: TicketStatus,
    pub priority: Priority,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub crm_sync_state: BTreeMap<String, CrmSyncState>,
    /// Latest staff note, set alongside a status change.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Ticket {
    /// New tickets always start `Open`, with every target CRM `Pending`.
    pub fn new(
        conversation_id: Uuid,
        priority: Priority,
        summary: &str,
        crm_targets: &BTreeSet<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            ticket_id: Uuid::new_v4(),
            conversation_id,
            status: TicketStatus::Open,
            priority,
            summary: summary.to_string(),
            created_at: now,
            last_updated: now,
            crm_sync_state: crm_targets
                .iter()
                .map(|t| (t.clone(), CrmSyncState::Pending))
                .collect(),
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn failed_targets(&self) -> BTreeSet<String> {
        self.crm_sync_state
            .iter()
            .filter(|(_, state)| **state == CrmSyncState::Failed)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ticket_is_open_and_pending_everywhere() {
        let targets: BTreeSet<String> = ["hubspot".to_string(), "pipedrive".to_string()].into();
        let t = Ticket::new(Uuid::new_v4(), Priority::High, "help", &targets);
        assert_eq!(t.status, TicketStatus::Open);
        assert!(t.is_active());
        assert!(t.crm_sync_state.values().all(|s| *s == CrmSyncState::Pending));
        assert!(t.failed_targets().is_empty());
    }

    #[test]
    fn status_order_is_forward() {
        assert!(TicketStatus::Open < TicketStatus::InProgress);
        assert!(TicketStatus::InProgress < TicketStatus::Resolved);
        assert!(!TicketStatus::Resolved.is_active());
    }
}
