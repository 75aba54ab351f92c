//! src/crm/clients/mod.rs
//!
//! One `CrmClient` per supported CRM, plus the status/transport mapping
//! they share.

pub mod hubspot;
pub mod pipedrive;
pub mod rdstation;
pub mod salesforce;

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

use clinicbot_common::models::CrmError;
use clinicbot_common::traits::CrmClient;

use crate::config::CrmConfig;

pub use hubspot::HubSpotClient;
pub use pipedrive::PipedriveClient;
pub use rdstation::RdStationClient;
pub use salesforce::SalesforceClient;

/// Builds a client for every CRM that has a config section.
pub fn from_config(config: &CrmConfig) -> Vec<Arc<dyn CrmClient>> {
    let http = match reqwest::Client::builder().timeout(config.timeout()).build() {
        Ok(c) => c,
        Err(e) => {
            warn!("Falling back to default HTTP client for CRMs: {}", e);
            reqwest::Client::new()
        }
    };

    let mut clients: Vec<Arc<dyn CrmClient>> = Vec::new();
    if let Some(cfg) = &config.hubspot {
        clients.push(Arc::new(HubSpotClient::new(http.clone(), cfg)));
    }
    if let Some(cfg) = &config.pipedrive {
        clients.push(Arc::new(PipedriveClient::new(http.clone(), cfg)));
    }
    if let Some(cfg) = &config.rdstation {
        clients.push(Arc::new(RdStationClient::new(http.clone(), cfg)));
    }
    if let Some(cfg) = &config.salesforce {
        clients.push(Arc::new(SalesforceClient::new(http.clone(), cfg)));
    }
    clients
}

/// Maps a non-success HTTP status to the CRM error taxonomy.
pub(crate) fn status_error(crm: &str, status: StatusCode, body: &str) -> CrmError {
    let detail = format!("{} returned {}: {}", crm, status.as_u16(), truncate(body, 300));
    match status.as_u16() {
        401 | 403 => CrmError::Auth(detail),
        429 => CrmError::RateLimited(detail),
        400 | 422 => CrmError::MalformedPayload(detail),
        408 | 500..=599 => CrmError::Network(detail),
        _ => CrmError::Rejected(detail),
    }
}

pub(crate) fn transport_error(crm: &str, e: reqwest::Error) -> CrmError {
    if e.is_decode() {
        CrmError::Rejected(format!("{}: unreadable response: {}", crm, e))
    } else {
        CrmError::Network(format!("{}: {}", crm, e))
    }
}

/// Sends a prepared request and returns the JSON body of a 2xx response.
pub(crate) async fn send_json(crm: &str, request: reqwest::RequestBuilder) -> Result<Value, CrmError> {
    let response = request.send().await.map_err(|e| transport_error(crm, e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(crm, status, &body));
    }
    response.json::<Value>().await.map_err(|e| transport_error(crm, e))
}

/// Pulls a string or numeric id out of `value` at `pointer`.
pub(crate) fn extract_id(crm: &str, value: &Value, pointer: &str) -> Result<String, CrmError> {
    match value.pointer(pointer) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CrmError::Rejected(format!("{}: response has no {}", crm, pointer))),
    }
}

/// "Maria da Silva" -> ("Maria", "da Silva").
pub(crate) fn split_name(name: Option<&str>) -> (String, String) {
    let name = name.map(str::trim).unwrap_or_default();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error("x", StatusCode::UNAUTHORIZED, ""), CrmError::Auth(_)));
        assert!(matches!(status_error("x", StatusCode::TOO_MANY_REQUESTS, ""), CrmError::RateLimited(_)));
        assert!(matches!(status_error("x", StatusCode::UNPROCESSABLE_ENTITY, ""), CrmError::MalformedPayload(_)));
        assert!(matches!(status_error("x", StatusCode::BAD_GATEWAY, ""), CrmError::Network(_)));
        assert!(matches!(status_error("x", StatusCode::CONFLICT, ""), CrmError::Rejected(_)));
    }

    #[test]
    fn names_split_on_first_space() {
        assert_eq!(split_name(Some("Maria da Silva")), ("Maria".into(), "da Silva".into()));
        assert_eq!(split_name(Some("Ana")), ("Ana".into(), String::new()));
        assert_eq!(split_name(None), (String::new(), String::new()));
    }

    #[test]
    fn ids_can_be_numbers_or_strings() {
        let v = serde_json::json!({"id": "abc", "data": {"id": 42}});
        assert_eq!(extract_id("x", &v, "/id").unwrap(), "abc");
        assert_eq!(extract_id("x", &v, "/data/id").unwrap(), "42");
        assert!(extract_id("x", &v, "/missing").is_err());
    }
}
