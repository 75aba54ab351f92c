//! src/crm/clients/rdstation.rs

use async_trait::async_trait;
use serde_json::{json, Value};

use clinicbot_common::models::{CrmError, CrmReceipt, LeadPayload};
use clinicbot_common::traits::CrmClient;

use crate::config::RdStationConfig;

use super::{extract_id, send_json};

const DEFAULT_BASE_URL: &str = "https://api.rd.services";

/// RD Station creates leads from CONVERSION events.
pub struct RdStationClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl RdStationClient {
    pub fn new(http: reqwest::Client, config: &RdStationConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn event_body(lead: &LeadPayload) -> Value {
        json!({
            "event_type": "CONVERSION",
            "event_family": "CDP",
            "payload": {
                "conversion_identifier": "chatbot-lead",
                "name": lead.contact.name.clone().unwrap_or_default(),
                "email": lead.contact.email.clone().unwrap_or_default(),
                "mobile_phone": lead.contact.phone.clone().unwrap_or_default(),
                "cf_message": lead.message,
                "cf_source": lead.source,
                "cf_urgency": lead.priority.to_string(),
                "cf_language": lead.language.as_str(),
            }
        })
    }
}

#[async_trait]
impl CrmClient for RdStationClient {
    fn name(&self) -> &str {
        "rdstation"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn push_lead(&self, lead: &LeadPayload) -> Result<CrmReceipt, CrmError> {
        if !self.is_configured() {
            return Err(CrmError::NotConfigured("rdstation: missing api key".into()));
        }
        // Conversion events are keyed by email.
        if lead.contact.email.is_none() {
            return Err(CrmError::MalformedPayload("rdstation: lead has no email".into()));
        }
        let url = format!("{}/platform/events", self.base_url);
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&Self::event_body(lead));

        let body = send_json(self.name(), request).await?;
        Ok(CrmReceipt {
            external_id: extract_id(self.name(), &body, "/event_uuid")?,
        })
    }
}
