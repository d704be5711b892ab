//! LeadPilot configuration system.
//!
//! Loaded from `~/.leadpilot/config.toml` (or an explicit path), then
//! overridden by the provider environment variables so secrets can stay out
//! of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LeadPilotError, Result};
use crate::types::ContactFilters;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadPilotConfig {
    #[serde(default)]
    pub zoominfo: ZoomInfoConfig,
    #[serde(default)]
    pub hubspot: HubSpotConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl LeadPilotConfig {
    /// Load from `path` if given, else the default path; missing file = defaults.
    /// Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LeadPilotError::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| LeadPilotError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// The LeadPilot home directory (`~/.leadpilot`).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".leadpilot")
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ZOOMINFO_USERNAME") {
            self.zoominfo.username = v;
        }
        if let Some(v) = get("ZOOMINFO_PASSWORD") {
            self.zoominfo.password = v;
        }
        if let Some(v) = get("ZOOMINFO_API_KEY") {
            self.zoominfo.api_key = v;
        }
        if let Some(v) = get("HUBSPOT_ACCESS_TOKEN") {
            self.hubspot.access_token = v;
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = v;
        }
        if let Some(v) = get("SLACK_WEBHOOK_URL") {
            self.notify.slack_webhook_url = Some(v);
        }
        if let Some(v) = get("CRON_SECRET") {
            self.gateway.cron_secret = Some(v);
        }
        if let Some(v) = get("LEADPILOT_DATABASE_PATH") {
            self.database.path = v;
        }
    }
}

/// Contact-data provider (ZoomInfo) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomInfoConfig {
    #[serde(default = "default_zoominfo_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub api_key: String,
    /// How long a JWT is reused. Shorter than the real one-hour lifetime.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_zoominfo_url() -> String { "https://api.zoominfo.com".into() }
fn default_token_ttl() -> u64 { 50 * 60 }

impl Default for ZoomInfoConfig {
    fn default() -> Self {
        Self {
            base_url: default_zoominfo_url(),
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// CRM (HubSpot) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotConfig {
    #[serde(default = "default_hubspot_url")]
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_hubspot_url() -> String { "https://api.hubapi.com".into() }
fn default_page_size() -> u32 { 100 }

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            base_url: default_hubspot_url(),
            access_token: String::new(),
            page_size: default_page_size(),
        }
    }
}

/// Language-model (Anthropic Messages API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_anthropic_url() -> String { "https://api.anthropic.com".into() }
fn default_model() -> String { "claude-3-5-sonnet-20241022".into() }
fn default_max_tokens() -> u32 { 4096 }
fn default_api_version() -> String { "2023-06-01".into() }

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_url(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    LeadPilotConfig::home_dir()
        .join("leadpilot.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for `/run-workflow`. `None` disables the check.
    #[serde(default)]
    pub cron_secret: Option<String>,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cron_secret: None,
        }
    }
}

/// Operator notification settings. No webhook = notifications disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_delay_ms() -> u64 { 1000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

/// How the workflow runner reaches the phase handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Call the gateway's own phase endpoints over HTTP.
    #[default]
    Http,
    /// Invoke the phase handlers in-process.
    Local,
}

/// Daily workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_fetch_filters")]
    pub fetch_filters: ContactFilters,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    /// 5-field cron expression (UTC). `None` = only external triggers.
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub dispatch: DispatchMode,
}

fn default_fetch_filters() -> ContactFilters {
    ContactFilters {
        industry: Some("Real Estate".into()),
        employee_count_min: Some(10),
        ..ContactFilters::default()
    }
}
fn default_fetch_limit() -> u32 { 50 }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            fetch_filters: default_fetch_filters(),
            fetch_limit: default_fetch_limit(),
            schedule: None,
            dispatch: DispatchMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// With `syncAll`, skip leads that already carry a CRM id.
    #[serde(default)]
    pub skip_linked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Maximum leads scored per run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
    /// Attach the rationale as a note on the CRM contact.
    #[serde(default)]
    pub push_notes_to_crm: bool,
}

fn default_batch_limit() -> u32 { 50 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            push_notes_to_crm: false,
        }
    }
}
