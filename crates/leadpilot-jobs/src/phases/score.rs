//! Scoring phase: ask the language model for a 0-100 fit score per lead.

use leadpilot_core::error::Result;
use leadpilot_core::retry::retry_with_backoff;
use leadpilot_core::types::{Lead, LeadSelection, NewLeadScore};
use leadpilot_providers::parse_json_reply;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ItemFailure, PhaseContext, close_job};

pub const JOB_TYPE: &str = "lead_scoring";

const SYSTEM_PROMPT: &str = "You are a B2B sales analyst qualifying inbound leads. \
Score how well each lead fits an ideal customer profile of growing real-estate \
companies. Reply with JSON only: {\"score\": <integer 0-100>, \"rationale\": \"<one or two sentences>\"}.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_ids: Option<Vec<String>>,
    /// Score every unscored lead, not only the ones already in the CRM.
    #[serde(default)]
    pub score_all: bool,
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    score: f64,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredLead {
    #[serde(rename = "leadId")]
    pub lead_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutcome {
    pub success: bool,
    pub scored_count: usize,
    pub failed_count: usize,
    pub scored: Vec<ScoredLead>,
    pub failed: Vec<ItemFailure>,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

pub async fn score_leads(ctx: &PhaseContext, request: ScoreRequest) -> Result<ScoreOutcome> {
    let job_id = ctx
        .jobs
        .create_job(JOB_TYPE, Some(json!({ "request": request })))?;
    let result = run(ctx, &request, &job_id).await;
    close_job(&ctx.jobs, &job_id, "Scoring", result, |o| {
        json!({
            "scored_count": o.scored_count,
            "failed_count": o.failed_count,
            "scored": o.scored,
            "failed": o.failed,
        })
    })
}

async fn run(ctx: &PhaseContext, request: &ScoreRequest, job_id: &str) -> Result<ScoreOutcome> {
    let limit = ctx.scoring.batch_limit;
    let leads = match &request.lead_ids {
        Some(ids) if !ids.is_empty() => {
            let mut leads = ctx.leads.select_leads(&LeadSelection::Ids(ids.clone()))?;
            leads.truncate(limit as usize);
            leads
        }
        _ => ctx.leads.unscored_leads(!request.score_all, limit)?,
    };
    tracing::info!("🎯 Scoring {} leads", leads.len());

    let mut scored = Vec::new();
    let mut failed = Vec::new();
    for lead in &leads {
        match score_one(ctx, lead).await {
            Ok(score) => scored.push(ScoredLead {
                lead_id: lead.id.clone(),
                score,
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to score lead {}: {e}", lead.id);
                failed.push(ItemFailure::new(&lead.id, e.to_string()));
            }
        }
    }

    tracing::info!(
        "✅ Scoring complete: {} scored, {} failed",
        scored.len(),
        failed.len()
    );
    Ok(ScoreOutcome {
        success: true,
        scored_count: scored.len(),
        failed_count: failed.len(),
        scored,
        failed,
        job_id: job_id.to_string(),
    })
}

async fn score_one(ctx: &PhaseContext, lead: &Lead) -> Result<f64> {
    let research = ctx.leads.research_for_lead(&lead.id)?;
    let notes: Vec<&str> = research
        .iter()
        .filter_map(|r| r.summary_text.as_deref())
        .collect();
    let prompt = build_prompt(lead, &notes);

    let text = retry_with_backoff(&ctx.retry, || {
        ctx.model.complete(&prompt, Some(SYSTEM_PROMPT))
    })
    .await?;
    let reply: ScoreReply = parse_json_reply(&text)?;
    let score = reply.score.clamp(0.0, 100.0);

    ctx.leads.insert_score(&NewLeadScore {
        lead_id: lead.id.clone(),
        crm_id: lead.crm_id.clone(),
        score,
        rationale: reply.rationale.clone(),
    })?;

    if ctx.scoring.push_notes_to_crm {
        if let Some(crm_id) = lead.crm_id.as_deref() {
            let body = format!(
                "Lead score: {score:.0}/100\n{}",
                reply.rationale.as_deref().unwrap_or_default()
            );
            // The score is already stored; a missing note is not a failed item.
            if let Err(e) =
                retry_with_backoff(&ctx.retry, || ctx.crm.create_contact_note(crm_id, &body)).await
            {
                tracing::warn!("⚠️ Could not attach score note to {crm_id}: {e}");
            }
        }
    }
    Ok(score)
}

fn build_prompt(lead: &Lead, research: &[&str]) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".into());
    let mut prompt = format!(
        "Lead:\n- Name: {}\n- Title: {}\n- Company: {}\n- Email: {}\n",
        lead.display_name(),
        field(&lead.title),
        field(&lead.company),
        field(&lead.email),
    );
    if let Some(payload) = &lead.payload {
        prompt.push_str(&format!("- Source record: {payload}\n"));
    }
    if !research.is_empty() {
        prompt.push_str("\nResearch notes:\n");
        for note in research {
            prompt.push_str(&format!("- {note}\n"));
        }
    }
    prompt
}
