//! Error taxonomy for LeadPilot.
//!
//! Provider failures carry an origin tag and the HTTP status so the retry
//! classifier can inspect them structurally.

use serde::{Deserialize, Serialize};

/// Which external system an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    ZoomInfo,
    HubSpot,
    Anthropic,
    Notifier,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ZoomInfo => "ZoomInfo",
            Self::HubSpot => "HubSpot",
            Self::Anthropic => "Anthropic",
            Self::Notifier => "Notifier",
        }
    }

    /// Machine-readable error code surfaced in API error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZoomInfo => "ZOOMINFO_ERROR",
            Self::HubSpot => "HUBSPOT_ERROR",
            Self::Anthropic => "CLAUDE_ERROR",
            Self::Notifier => "NOTIFY_ERROR",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport-level failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    Timeout,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum LeadPilotError {
    #[error("{provider} API error ({status}): {message}")]
    Provider {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("{provider} network error: {message}")]
    Network {
        provider: ProviderKind,
        kind: NetworkErrorKind,
        message: String,
    },

    /// The provider contradicted itself (e.g. "already exists" then "not found").
    #[error("{message}")]
    NotFound {
        provider: ProviderKind,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),

    /// A workflow phase call that produced no JSON result.
    #[error("Phase call failed: {0}")]
    Dispatch(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LeadPilotError>;

impl LeadPilotError {
    pub fn provider(provider: ProviderKind, status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            status,
            message: message.into(),
        }
    }

    pub fn network(provider: ProviderKind, kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            provider,
            kind,
            message: message.into(),
        }
    }

    /// Transient = connection reset, timeout, HTTP 429 or any 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { kind, .. } => {
                matches!(kind, NetworkErrorKind::ConnectionReset | NetworkErrorKind::Timeout)
            }
            Self::Provider { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status used when this error reaches an API response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Json(_) => 400,
            Self::Unauthorized => 401,
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed => 405,
            Self::Provider { status, .. } => match *status {
                409 | 429 => *status,
                s if (500..600).contains(&s) => s,
                _ => 500,
            },
            Self::Network { kind, .. } => match kind {
                NetworkErrorKind::Timeout => 504,
                _ => 502,
            },
            Self::Dispatch(_) => 502,
            Self::Database(_) | Self::Config(_) | Self::Io(_) => 500,
        }
    }

    /// Machine-readable code for API error bodies.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Provider { provider, .. }
            | Self::Network { provider, .. }
            | Self::NotFound { provider, .. } => Some(provider.error_code()),
            Self::Database(_) => Some("DATABASE_ERROR"),
            Self::Validation(_) | Self::Json(_) => Some("VALIDATION_ERROR"),
            Self::Config(_) => Some("CONFIG_ERROR"),
            Self::Dispatch(_) | Self::Unauthorized | Self::MethodNotAllowed | Self::Io(_) => None,
        }
    }
}
