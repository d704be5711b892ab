//! Fetch phase: search the contact provider and store every hit as a lead.

use leadpilot_core::error::Result;
use leadpilot_core::retry::retry_with_backoff;
use leadpilot_core::types::{ContactFilters, NewLead};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{PhaseContext, close_job};

pub const JOB_TYPE: &str = "zoominfo_fetch";
const DEFAULT_LIMIT: u32 = 25;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub filters: ContactFilters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub success: bool,
    pub contacts_fetched: usize,
    pub contacts_inserted: usize,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

pub async fn fetch_contacts(ctx: &PhaseContext, request: FetchRequest) -> Result<FetchOutcome> {
    let job_id = ctx
        .jobs
        .create_job(JOB_TYPE, Some(json!({ "request": request })))?;
    let result = run(ctx, &request, &job_id).await;
    close_job(&ctx.jobs, &job_id, "Fetch", result, |o| {
        json!({
            "contacts_fetched": o.contacts_fetched,
            "contacts_inserted": o.contacts_inserted,
        })
    })
}

async fn run(ctx: &PhaseContext, request: &FetchRequest, job_id: &str) -> Result<FetchOutcome> {
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    tracing::info!("📥 Fetching up to {limit} contacts from ZoomInfo");

    let contacts = retry_with_backoff(&ctx.retry, || {
        ctx.source.search_contacts(&request.filters, limit)
    })
    .await?;
    tracing::info!("Found {} contacts", contacts.len());

    let mut inserted = 0;
    for contact in &contacts {
        match ctx.leads.insert_lead(&NewLead::from(contact)) {
            Ok(_) => inserted += 1,
            Err(e) => tracing::warn!("⚠️ Failed to insert contact {}: {e}", contact.id),
        }
    }
    tracing::info!("✅ Inserted {inserted}/{} contacts", contacts.len());

    Ok(FetchOutcome {
        success: true,
        contacts_fetched: contacts.len(),
        contacts_inserted: inserted,
        job_id: job_id.to_string(),
    })
}
