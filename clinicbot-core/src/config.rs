//! src/config.rs
//!
//! Application settings: an optional TOML file, then `.env`, then process
//! environment variables for secrets. Every section has defaults so an empty
//! file (or none at all) yields a runnable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use clinicbot_ai::{ProviderConfig, ProviderKind};
use clinicbot_common::models::LanguageCode;
use clinicbot_common::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    /// Postgres URL; the in-memory store is used when absent.
    #[serde(default)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Clinic language: fallback for detection and target for translation.
    #[serde(default)]
    pub base: LanguageCode,
    /// Shorter messages are not classified.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

fn default_min_chars() -> usize {
    8
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            base: LanguageCode::default(),
            min_chars: default_min_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    #[serde(default = "default_high_urgency_threshold")]
    pub high_urgency_threshold: f64,
    /// Prior turns sent to the AI provider.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_high_urgency_threshold() -> f64 {
    0.7
}

fn default_history_limit() -> usize {
    10
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            high_urgency_threshold: default_high_urgency_threshold(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Registered name of the provider used for replies.
    #[serde(default = "default_active_provider")]
    pub active_provider: String,
    /// Provider used for translation; defaults to `active_provider`.
    #[serde(default)]
    pub translation_provider: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_ai_retries")]
    pub max_retries: u32,
    #[serde(default = "default_clinic_name")]
    pub clinic_name: String,
    #[serde(default)]
    pub contact_line: Option<String>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

fn default_active_provider() -> String {
    "openai".to_string()
}

fn default_ai_timeout() -> u64 {
    20
}

fn default_ai_retries() -> u32 {
    1
}

fn default_clinic_name() -> String {
    "the clinic".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            active_provider: default_active_provider(),
            translation_provider: None,
            timeout_secs: default_ai_timeout(),
            max_retries: default_ai_retries(),
            clinic_name: default_clinic_name(),
            contact_line: None,
            providers: Vec::new(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// CRMs a new ticket is pushed to. Empty means every configured CRM.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_crm_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_crm_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_crm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub hubspot: Option<HubSpotConfig>,
    #[serde(default)]
    pub pipedrive: Option<PipedriveConfig>,
    #[serde(default)]
    pub rdstation: Option<RdStationConfig>,
    #[serde(default)]
    pub salesforce: Option<SalesforceConfig>,
}

fn default_crm_attempts() -> u32 {
    3
}

fn default_crm_backoff_ms() -> u64 {
    500
}

fn default_crm_timeout() -> u64 {
    10
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            max_attempts: default_crm_attempts(),
            base_backoff_ms: default_crm_backoff_ms(),
            timeout_secs: default_crm_timeout(),
            hubspot: None,
            pipedrive: None,
            rdstation: None,
            salesforce: None,
        }
    }
}

impl CrmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// Names of the CRMs with a config section, in a fixed order.
    pub fn configured(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.hubspot.is_some() {
            names.push("hubspot".to_string());
        }
        if self.pipedrive.is_some() {
            names.push("pipedrive".to_string());
        }
        if self.rdstation.is_some() {
            names.push("rdstation".to_string());
        }
        if self.salesforce.is_some() {
            names.push("salesforce".to_string());
        }
        names
    }

    pub fn enabled_targets(&self) -> Vec<String> {
        if self.targets.is_empty() {
            self.configured()
        } else {
            self.targets.iter().map(|t| t.to_lowercase()).collect()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubSpotConfig {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipedriveConfig {
    pub api_token: String,
    /// Company domain, e.g. `https://clinic.pipedrive.com`.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RdStationConfig {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesforceConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub login_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Log every ticket notification through tracing.
    #[serde(default = "default_true")]
    pub log: bool,
    /// Staff webhook receiving a JSON POST per ticket event.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_notify_timeout() -> u64 {
    5
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log: true,
            webhook_url: None,
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl NotificationConfig {
    /// Upper bound for a single notifier call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,
    #[serde(default = "default_resync_batch")]
    pub resync_batch: i64,
}

fn default_resync_interval() -> u64 {
    300
}

fn default_resync_batch() -> i64 {
    50
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval(),
            resync_batch: default_resync_batch(),
        }
    }
}

impl TaskConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

impl AppConfig {
    /// Loads `.env`, then the TOML file at `path` (required when given),
    /// then environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded .env file");
        }

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::Config(format!("config file not found: {}", path.display())));
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies secrets from the environment. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.database_url = Some(url);
        }

        if let Some(key) = get("OPENAI_API_KEY") {
            self.set_provider_key(ProviderKind::OpenAi, "openai", "gpt-4o-mini", key);
        }
        if let Some(key) = get("GOOGLE_API_KEY") {
            self.set_provider_key(ProviderKind::Gemini, "gemini", "gemini-1.5-flash", key);
        }

        if let Some(key) = get("HUBSPOT_API_KEY") {
            self.crm.hubspot.get_or_insert_with(HubSpotConfig::default).api_key = key;
        }
        if let Some(token) = get("PIPEDRIVE_API_TOKEN") {
            self.crm.pipedrive.get_or_insert_with(PipedriveConfig::default).api_token = token;
        }
        if let Some(domain) = get("PIPEDRIVE_DOMAIN") {
            let base = if domain.contains("://") {
                domain
            } else {
                format!("https://{}.pipedrive.com/api", domain)
            };
            self.crm.pipedrive.get_or_insert_with(PipedriveConfig::default).base_url = Some(base);
        }
        if let Some(key) = get("RDSTATION_API_KEY") {
            self.crm.rdstation.get_or_insert_with(RdStationConfig::default).api_key = key;
        }

        let sf_fields = [
            get("SALESFORCE_CLIENT_ID"),
            get("SALESFORCE_CLIENT_SECRET"),
            get("SALESFORCE_USERNAME"),
            get("SALESFORCE_PASSWORD"),
        ];
        if sf_fields.iter().any(Option::is_some) {
            let [id, secret, user, pass] = sf_fields;
            let sf = self.crm.salesforce.get_or_insert_with(SalesforceConfig::default);
            if let Some(v) = id {
                sf.client_id = v;
            }
            if let Some(v) = secret {
                sf.client_secret = v;
            }
            if let Some(v) = user {
                sf.username = v;
            }
            if let Some(v) = pass {
                sf.password = v;
            }
        }

        if let Some(url) = get("STAFF_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url);
        }
    }

    fn set_provider_key(&mut self, kind: ProviderKind, name: &str, model: &str, key: String) {
        match self.ai.providers.iter_mut().find(|p| p.kind == kind) {
            Some(provider) if provider.api_key.is_empty() => provider.api_key = key,
            Some(_) => {}
            None => self.ai.providers.push(ProviderConfig {
                name: name.to_string(),
                kind,
                api_base: None,
                api_key: key,
                default_model: model.to_string(),
                max_tokens: 500,
                temperature: 0.7,
                options: Default::default(),
            }),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let t = self.triage.high_urgency_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(Error::Config(format!(
                "triage.high_urgency_threshold must be in (0, 1], got {}",
                t
            )));
        }
        if self.crm.max_attempts == 0 {
            return Err(Error::Config("crm.max_attempts must be at least 1".into()));
        }
        if self.ai.timeout_secs == 0 {
            return Err(Error::Config("ai.timeout_secs must be positive".into()));
        }
        if self.tasks.resync_interval_secs == 0 {
            return Err(Error::Config("tasks.resync_interval_secs must be positive".into()));
        }
        let known = ["hubspot", "pipedrive", "rdstation", "salesforce"];
        if let Some(unknown) = self.crm.targets.iter().find(|t| !known.contains(&t.to_lowercase().as_str())) {
            return Err(Error::Config(format!("unknown CRM target '{}'", unknown)));
        }
        Ok(())
    }
}
