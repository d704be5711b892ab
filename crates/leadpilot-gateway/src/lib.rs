//! # LeadPilot Gateway
//!
//! HTTP surface over the phase handlers and the workflow runner.
//!
//! ```text
//! POST /fetch-contacts ─┐
//! POST /sync-contacts  ─┼── leadpilot_jobs::phases
//! POST /score-leads    ─┘
//! GET|POST /run-workflow ── WorkflowRunner ── HttpDispatch ──► (the three routes above)
//! GET /jobs/stats, GET /health
//! ```

pub mod routes;
pub mod server;

pub use routes::ApiError;
pub use server::{AppState, build_router, start};
