//! Shared request plumbing: client construction, status checks and
//! transport-error classification.

use std::error::Error as _;
use std::time::Duration;

use leadpilot_core::error::{LeadPilotError, NetworkErrorKind, ProviderKind, Result};
use serde::de::DeserializeOwned;

/// Per-request timeout for every provider call.
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) fn build_client(provider: ProviderKind) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| LeadPilotError::Config(format!("{provider} HTTP client: {e}")))
}

/// Map a reqwest failure onto the network error taxonomy.
pub(crate) fn transport_error(provider: ProviderKind, err: reqwest::Error) -> LeadPilotError {
    let kind = classify(&err);
    LeadPilotError::network(provider, kind, err.to_string())
}

fn classify(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => return NetworkErrorKind::ConnectionReset,
                std::io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                _ => {}
            }
        }
        source = cause.source();
    }
    NetworkErrorKind::Other
}

/// Pass 2xx responses through; turn anything else into a provider error
/// carrying the status and the response body.
pub(crate) async fn check_status(
    provider: ProviderKind,
    resp: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    Err(LeadPilotError::provider(provider, status.as_u16(), message))
}

/// Decode a JSON body, mapping decode failures to a provider error.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: ProviderKind,
    resp: reqwest::Response,
) -> Result<T> {
    let status = resp.status().as_u16();
    resp.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            LeadPilotError::provider(provider, status, format!("invalid response body: {e}"))
        } else {
            transport_error(provider, e)
        }
    })
}
