//! src/crm/clients/pipedrive.rs

use async_trait::async_trait;
use serde_json::{json, Value};

use clinicbot_common::models::{CrmError, CrmReceipt, LeadPayload};
use clinicbot_common::traits::CrmClient;

use crate::config::PipedriveConfig;

use super::{extract_id, send_json};

const DEFAULT_BASE_URL: &str = "https://api.pipedrive.com";

pub struct PipedriveClient {
    http: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl PipedriveClient {
    pub fn new(http: reqwest::Client, config: &PipedriveConfig) -> Self {
        Self {
            http,
            api_token: config.api_token.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn lead_body(lead: &LeadPayload) -> Value {
        let who = lead.contact.name.as_deref().unwrap_or("Anonymous");
        json!({
            "title": format!("Chatbot lead - {} ({})", who, lead.priority),
            "person_name": lead.contact.name.clone().unwrap_or_default(),
            "phone": lead.contact.phone.clone().unwrap_or_default(),
            "email": lead.contact.email.clone().unwrap_or_default(),
            "note": lead.message,
            "source_name": lead.source,
        })
    }
}

#[async_trait]
impl CrmClient for PipedriveClient {
    fn name(&self) -> &str {
        "pipedrive"
    }

    fn is_configured(&self) -> bool {
        !self.api_token.is_empty()
    }

    async fn push_lead(&self, lead: &LeadPayload) -> Result<CrmReceipt, CrmError> {
        if !self.is_configured() {
            return Err(CrmError::NotConfigured("pipedrive: missing api token".into()));
        }
        let url = format!("{}/v1/leads", self.base_url);
        let request = self
            .http
            .post(url)
            .query(&[("api_token", self.api_token.as_str())])
            .json(&Self::lead_body(lead));

        let body = send_json(self.name(), request).await?;
        Ok(CrmReceipt {
            external_id: extract_id(self.name(), &body, "/data/id")?,
        })
    }

    async fn push_transcript(
        &self,
        lead_receipt: &CrmReceipt,
        lead: &LeadPayload,
    ) -> Result<Option<CrmReceipt>, CrmError> {
        let url = format!("{}/v1/notes", self.base_url);
        let request = self
            .http
            .post(url)
            .query(&[("api_token", self.api_token.as_str())])
            .json(&json!({
                "content": lead.transcript,
                "lead_id": lead_receipt.external_id,
            }));

        let body = send_json(self.name(), request).await?;
        Ok(Some(CrmReceipt {
            external_id: extract_id(self.name(), &body, "/data/id")?,
        }))
    }
}
