//! API route handlers for the gateway.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use leadpilot_core::config::DispatchMode;
use leadpilot_core::error::LeadPilotError;
use leadpilot_jobs::phases::{
    self, FetchOutcome, FetchRequest, ScoreOutcome, ScoreRequest, SyncOutcome, SyncRequest,
};
use leadpilot_jobs::{HttpDispatch, LocalDispatch, PhaseDispatch};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::server::AppState;

/// A [`LeadPilotError`] rendered as `{error, code?}` with its HTTP status.
#[derive(Debug)]
pub struct ApiError(pub LeadPilotError);

impl From<LeadPilotError> for ApiError {
    fn from(err: LeadPilotError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("❌ API error: {}", self.0);
        }

        let mut body = json!({ "error": self.0.to_string() });
        if let Some(code) = self.0.code() {
            body["code"] = json!(code);
        }
        (status, Json(body)).into_response()
    }
}

/// Empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError(e.into()))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError(LeadPilotError::MethodNotAllowed)
}

pub async fn fetch_contacts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<FetchOutcome>, ApiError> {
    let request: FetchRequest = parse_body(&body)?;
    Ok(Json(phases::fetch_contacts(&state.phases, request).await?))
}

pub async fn sync_contacts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SyncOutcome>, ApiError> {
    let request: SyncRequest = parse_body(&body)?;
    Ok(Json(phases::sync_contacts(&state.phases, request).await?))
}

pub async fn score_leads(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScoreOutcome>, ApiError> {
    let request: ScoreRequest = parse_body(&body)?;
    Ok(Json(phases::score_leads(&state.phases, request).await?))
}

/// Scheme and host this request reached us on.
fn base_url(headers: &HeaderMap, fallback_host: &str) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback_host);
    format!("{proto}://{host}")
}

fn authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    provided == Some(format!("Bearer {secret}").as_str())
}

/// Trigger the full workflow (external cron or manual call).
pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, state.cron_secret.as_deref()) {
        tracing::warn!("⚠️ Rejected /run-workflow call with missing or wrong bearer");
        return ApiError(LeadPilotError::Unauthorized).into_response();
    }

    let dispatch: Box<dyn PhaseDispatch> = match state.dispatch {
        DispatchMode::Http => Box::new(HttpDispatch::new(base_url(&headers, &state.fallback_host))),
        DispatchMode::Local => Box::new(LocalDispatch::new(state.phases.clone())),
    };

    match state.runner.run(dispatch.as_ref(), method.as_str()).await {
        Ok(report) => Json(report).into_response(),
        Err(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": failure.error.to_string(),
                "jobId": failure.job_id,
            })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_stats_hours")]
    pub hours: u32,
}

fn default_stats_hours() -> u32 {
    24
}

/// Per-type job counts over the last `hours`; `stats` is null when the
/// store could not be read.
pub async fn job_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Json<serde_json::Value> {
    Json(json!({ "stats": state.jobs().get_job_stats(query.hours) }))
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "leadpilot-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
