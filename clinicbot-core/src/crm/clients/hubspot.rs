//! src/crm/clients/hubspot.rs

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use clinicbot_common::models::{CrmError, CrmReceipt, LeadPayload};
use clinicbot_common::traits::CrmClient;

use crate::config::HubSpotConfig;

use super::{extract_id, send_json, split_name};

const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// Creates a contact through the CRM v3 objects API with a private-app token.
pub struct HubSpotClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HubSpotClient {
    pub fn new(http: reqwest::Client, config: &HubSpotConfig) -> Self {
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

    pub fn contact_body(lead: &LeadPayload) -> Value {
        let (first, last) = split_name(lead.contact.name.as_deref());
        json!({
            "properties": {
                "email": lead.contact.email.clone().unwrap_or_default(),
                "firstname": first,
                "lastname": last,
                "phone": lead.contact.phone.clone().unwrap_or_default(),
                "lifecyclestage": "lead",
                "hs_lead_status": "NEW",
                "lead_source": lead.source,
                "message": lead.message,
                "chat_session_id": lead.conversation_id.to_string(),
                "urgency_level": lead.priority.to_string(),
            }
        })
    }

    /// Note on the contact; association type 202 is note -> contact.
    pub fn note_body(contact_id: &str, lead: &LeadPayload) -> Value {
        json!({
            "properties": {
                "hs_note_body": lead.transcript,
                "hs_timestamp": Utc::now().to_rfc3339(),
            },
            "associations": [{
                "to": { "id": contact_id },
                "types": [{ "associationCategory": "HUBSPOT_DEFINED", "associationTypeId": 202 }]
            }]
        })
    }
}

#[async_trait]
impl CrmClient for HubSpotClient {
    fn name(&self) -> &str {
        "hubspot"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn push_lead(&self, lead: &LeadPayload) -> Result<CrmReceipt, CrmError> {
        if !self.is_configured() {
            return Err(CrmError::NotConfigured("hubspot: missing api key".into()));
        }
        let url = format!("{}/crm/v3/objects/contacts", self.base_url);
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&Self::contact_body(lead));

        let body = send_json(self.name(), request).await?;
        Ok(CrmReceipt {
            external_id: extract_id(self.name(), &body, "/id")?,
        })
    }

    async fn push_transcript(
        &self,
        lead_receipt: &CrmReceipt,
        lead: &LeadPayload,
    ) -> Result<Option<CrmReceipt>, CrmError> {
        let url = format!("{}/crm/v3/objects/notes", self.base_url);
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&Self::note_body(&lead_receipt.external_id, lead));

        let body = send_json(self.name(), request).await?;
        Ok(Some(CrmReceipt {
            external_id: extract_id(self.name(), &body, "/id")?,
        }))
    }
}
