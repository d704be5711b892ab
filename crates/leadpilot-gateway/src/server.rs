//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use leadpilot_core::config::{DispatchMode, LeadPilotConfig};
use leadpilot_jobs::{CronSchedule, JobLog, LocalDispatch, PhaseContext, WorkflowRunner};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub phases: PhaseContext,
    pub runner: Arc<WorkflowRunner>,
    /// Bearer secret for `/run-workflow`; `None` leaves it open.
    pub cron_secret: Option<String>,
    pub dispatch: DispatchMode,
    /// Used for self-calls when a request carries no `Host` header.
    pub fallback_host: String,
}

impl AppState {
    pub fn new(config: &LeadPilotConfig, phases: PhaseContext, runner: Arc<WorkflowRunner>) -> Self {
        let host = match config.gateway.host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };
        Self {
            phases,
            runner,
            cron_secret: config.gateway.cron_secret.clone(),
            dispatch: config.workflow.dispatch,
            fallback_host: format!("{host}:{}", config.gateway.port),
        }
    }

    pub fn jobs(&self) -> &JobLog {
        &self.phases.jobs
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route(
            "/fetch-contacts",
            post(routes::fetch_contacts).fallback(routes::method_not_allowed),
        )
        .route(
            "/sync-contacts",
            post(routes::sync_contacts).fallback(routes::method_not_allowed),
        )
        .route(
            "/score-leads",
            post(routes::score_leads).fallback(routes::method_not_allowed),
        )
        .route(
            "/run-workflow",
            get(routes::run_workflow)
                .post(routes::run_workflow)
                .fallback(routes::method_not_allowed),
        )
        .route("/jobs/stats", get(routes::job_stats))
        .route("/health", get(routes::health_check))
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server, plus the workflow schedule when one is configured.
pub async fn start(config: &LeadPilotConfig, state: AppState) -> anyhow::Result<()> {
    if let Some(expr) = &config.workflow.schedule {
        let schedule = CronSchedule::parse(expr)?;
        leadpilot_jobs::spawn_workflow_schedule(
            schedule,
            state.runner.clone(),
            Arc::new(LocalDispatch::new(state.phases.clone())),
        );
    }

    let app = build_router(state);
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
