//! src/crm/clients/salesforce.rs
//!
//! Username/password OAuth flow. The access token is cached and refreshed
//! once when the API answers 401.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use clinicbot_common::models::{CrmError, CrmReceipt, LeadPayload, Priority};
use clinicbot_common::traits::CrmClient;

use crate::config::SalesforceConfig;

use super::{extract_id, send_json, split_name, transport_error};

const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";
const API_VERSION: &str = "v52.0";

#[derive(Debug, Clone, Deserialize)]
struct AccessToken {
    access_token: String,
    instance_url: String,
}

pub struct SalesforceClient {
    http: reqwest::Client,
    config: SalesforceConfig,
    login_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl SalesforceClient {
    pub fn new(http: reqwest::Client, config: &SalesforceConfig) -> Self {
        Self {
            http,
            login_url: config
                .login_url
                .clone()
                .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            config: config.clone(),
            token: Mutex::new(None),
        }
    }

    pub fn lead_body(lead: &LeadPayload) -> Value {
        let (first, last) = split_name(lead.contact.name.as_deref());
        let last = if last.is_empty() { "Chatbot".to_string() } else { last };
        let rating = match lead.priority {
            Priority::High | Priority::Critical => "Hot",
            Priority::Medium => "Warm",
            Priority::Low => "Cold",
        };
        json!({
            "FirstName": first,
            "LastName": last,
            "Email": lead.contact.email.clone().unwrap_or_default(),
            "Phone": lead.contact.phone.clone().unwrap_or_default(),
            "Company": "Individual",
            "LeadSource": lead.source,
            "Status": "Open - Not Contacted",
            "Description": lead.message,
            "Rating": rating,
        })
    }

    async fn access_token(&self) -> Result<AccessToken, CrmError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        debug!("Requesting Salesforce access token");
        let params = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];
        let request = self
            .http
            .post(format!("{}/services/oauth2/token", self.login_url))
            .form(&params);
        let body = send_json(self.name(), request).await?;
        let token: AccessToken = serde_json::from_value(body)
            .map_err(|e| CrmError::Auth(format!("salesforce: bad token response: {}", e)))?;

        info!("Salesforce token acquired for {}", token.instance_url);
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Completed Task on the lead, holding the conversation transcript.
    pub fn transcript_task_body(lead_id: &str, lead: &LeadPayload) -> Value {
        json!({
            "Subject": "Chatbot conversation",
            "Description": lead.transcript,
            "WhoId": lead_id,
            "Status": "Completed",
        })
    }

    async fn post_sobject(
        &self,
        token: &AccessToken,
        sobject: &str,
        body: &Value,
    ) -> Result<reqwest::Response, CrmError> {
        let url = format!(
            "{}/services/data/{}/sobjects/{}/",
            token.instance_url.trim_end_matches('/'),
            API_VERSION,
            sobject
        );
        self.http
            .post(url)
            .bearer_auth(&token.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))
    }

    async fn create(&self, sobject: &str, body: &Value) -> Result<CrmReceipt, CrmError> {
        let mut token = self.access_token().await?;
        let mut response = self.post_sobject(&token, sobject, body).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("Salesforce token rejected, refreshing");
            *self.token.lock().await = None;
            token = self.access_token().await?;
            response = self.post_sobject(&token, sobject, body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(super::status_error(self.name(), status, &text));
        }
        let created: Value = response.json().await.map_err(|e| transport_error(self.name(), e))?;
        Ok(CrmReceipt {
            external_id: extract_id(self.name(), &created, "/id")?,
        })
    }
}

#[async_trait]
impl CrmClient for SalesforceClient {
    fn name(&self) -> &str {
        "salesforce"
    }

    fn is_configured(&self) -> bool {
        !self.config.client_id.is_empty()
            && !self.config.client_secret.is_empty()
            && !self.config.username.is_empty()
    }

    async fn push_lead(&self, lead: &LeadPayload) -> Result<CrmReceipt, CrmError> {
        if !self.is_configured() {
            return Err(CrmError::NotConfigured("salesforce: missing credentials".into()));
        }
        self.create("Lead", &Self::lead_body(lead)).await
    }

    async fn push_transcript(
        &self,
        lead_receipt: &CrmReceipt,
        lead: &LeadPayload,
    ) -> Result<Option<CrmReceipt>, CrmError> {
        let body = Self::transcript_task_body(&lead_receipt.external_id, lead);
        self.create("Task", &body).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicbot_common::models::{Channel, ContactInfo, LanguageCode};
    use uuid::Uuid;

    #[test]
    fn lead_defaults_last_name_and_rates_urgent_leads_hot() {
        let lead = LeadPayload {
            ticket_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            priority: Priority::Critical,
            urgency_score: 1.0,
            language: LanguageCode::Pt,
            channel: Channel::WhatsApp,
            message: "socorro".into(),
            contact: ContactInfo { name: Some("Ana".into()), ..Default::default() },
            source: "chatbot".into(),
            transcript: String::new(),
        };
        let body = SalesforceClient::lead_body(&lead);
        assert_eq!(body["FirstName"], "Ana");
        assert_eq!(body["LastName"], "Chatbot");
        assert_eq!(body["Rating"], "Hot");
    }

    #[test]
    fn transcript_task_points_at_the_lead() {
        let lead = LeadPayload {
            ticket_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            priority: Priority::Low,
            urgency_score: 0.1,
            language: LanguageCode::En,
            channel: Channel::WebWidget,
            message: "hours?".into(),
            contact: ContactInfo::default(),
            source: "chatbot".into(),
            transcript: "PATIENT: hours?".into(),
        };
        let body = SalesforceClient::transcript_task_body("00Q5e000001", &lead);
        assert_eq!(body["WhoId"], "00Q5e000001");
        assert_eq!(body["Description"], "PATIENT: hours?");
        assert_eq!(body["Status"], "Completed");
    }
}
