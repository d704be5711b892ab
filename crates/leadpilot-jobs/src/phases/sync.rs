//! Sync phase: push leads to the CRM and remember the CRM id.

use leadpilot_core::error::Result;
use leadpilot_core::retry::retry_with_backoff;
use leadpilot_core::types::{ContactProperties, LeadSelection};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ItemFailure, PhaseContext, close_job};

pub const JOB_TYPE: &str = "hubspot_sync";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_ids: Option<Vec<String>>,
    #[serde(default)]
    pub sync_all: bool,
}

impl SyncRequest {
    /// Explicit ids win unless `syncAll`; otherwise unlinked leads, or every
    /// lead with `syncAll`.
    pub fn selection(&self) -> LeadSelection {
        match &self.lead_ids {
            Some(ids) if !self.sync_all && !ids.is_empty() => LeadSelection::Ids(ids.clone()),
            _ if !self.sync_all => LeadSelection::Unlinked,
            _ => LeadSelection::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncedLead {
    #[serde(rename = "leadId")]
    pub lead_id: String,
    #[serde(rename = "hubspotId")]
    pub crm_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub synced_count: usize,
    pub failed_count: usize,
    pub synced: Vec<SyncedLead>,
    pub failed: Vec<ItemFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

pub async fn sync_contacts(ctx: &PhaseContext, request: SyncRequest) -> Result<SyncOutcome> {
    let job_id = ctx
        .jobs
        .create_job(JOB_TYPE, Some(json!({ "request": request })))?;
    let result = run(ctx, &request, &job_id).await;
    close_job(&ctx.jobs, &job_id, "Sync", result, |o| {
        json!({
            "synced_count": o.synced_count,
            "failed_count": o.failed_count,
            "synced": o.synced,
            "failed": o.failed,
        })
    })
}

async fn run(ctx: &PhaseContext, request: &SyncRequest, job_id: &str) -> Result<SyncOutcome> {
    let mut leads = ctx.leads.select_leads(&request.selection())?;
    if request.sync_all && ctx.sync.skip_linked {
        leads.retain(|lead| lead.crm_id.is_none());
    }

    if leads.is_empty() {
        tracing::info!("No leads to sync");
        return Ok(SyncOutcome {
            success: true,
            synced_count: 0,
            failed_count: 0,
            synced: Vec::new(),
            failed: Vec::new(),
            message: Some("No leads to sync".into()),
            job_id: job_id.to_string(),
        });
    }

    tracing::info!("🔄 Syncing {} leads to HubSpot", leads.len());
    let mut synced = Vec::new();
    let mut failed = Vec::new();

    for lead in &leads {
        let Some(properties) = ContactProperties::from_lead(lead) else {
            tracing::info!("Skipping lead {} - no email", lead.id);
            failed.push(ItemFailure::new(&lead.id, "No email"));
            continue;
        };

        let contact = match retry_with_backoff(&ctx.retry, || {
            ctx.crm.create_or_update_contact(&properties)
        })
        .await
        {
            Ok(contact) => contact,
            Err(e) => {
                tracing::warn!("⚠️ Failed to sync lead {}: {e}", lead.id);
                failed.push(ItemFailure::new(&lead.id, e.to_string()));
                continue;
            }
        };

        if let Err(e) = ctx.leads.set_crm_id(&lead.id, &contact.id) {
            tracing::warn!("⚠️ Synced lead {} but could not store CRM id: {e}", lead.id);
            failed.push(ItemFailure::new(&lead.id, e.to_string()));
            continue;
        }

        tracing::debug!("Synced lead {} to HubSpot ({})", lead.id, contact.id);
        synced.push(SyncedLead {
            lead_id: lead.id.clone(),
            crm_id: contact.id,
        });
    }

    tracing::info!(
        "✅ Sync complete: {} synced, {} failed",
        synced.len(),
        failed.len()
    );
    Ok(SyncOutcome {
        success: true,
        synced_count: synced.len(),
        failed_count: failed.len(),
        synced,
        failed,
        message: None,
        job_id: job_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{FakeModel, FakeSource, harness};
    use leadpilot_core::traits::{JobStore, LeadStore};
    use leadpilot_core::types::{JobStatus, NewLead};

    fn seed(store: &dyn LeadStore, email: Option<&str>) -> String {
        store
            .insert_lead(&NewLead {
                first_name: Some("Lee".into()),
                email: email.map(String::from),
                ..NewLead::default()
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_missing_emails_reported_per_item() {
        let h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        let emails = [Some("a@x.io"), None, Some("b@x.io"), None, Some("c@x.io")];
        for email in emails {
            seed(h.store.as_ref(), email);
        }

        let outcome = sync_contacts(&h.ctx, SyncRequest::default()).await.unwrap();
        assert_eq!(outcome.synced_count, 3);
        assert_eq!(outcome.failed_count, 2);
        assert!(outcome.failed.iter().all(|f| f.reason == "No email"));

        let linked = h.store.select_leads(&LeadSelection::Unlinked).unwrap();
        assert_eq!(linked.len(), 2);

        let job = h.store.get_job(&outcome.job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.details.unwrap()["failed_count"], 2);
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_batch() {
        let h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        h.crm.reject.lock().unwrap().push(("bad@x.io".into(), 400));
        seed(h.store.as_ref(), Some("bad@x.io"));
        seed(h.store.as_ref(), Some("good@x.io"));

        let outcome = sync_contacts(&h.ctx, SyncRequest::default()).await.unwrap();
        assert_eq!(outcome.synced_count, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].reason, "HubSpot API error (400): rejected");
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        let outcome = sync_contacts(&h.ctx, SyncRequest::default()).await.unwrap();
        assert_eq!(outcome.synced_count, 0);
        assert_eq!(outcome.message.as_deref(), Some("No leads to sync"));
    }

    #[tokio::test]
    async fn test_sync_all_resyncs_unless_skip_linked() {
        let mut h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        let linked = seed(h.store.as_ref(), Some("a@x.io"));
        h.store.set_crm_id(&linked, "hs-old").unwrap();
        seed(h.store.as_ref(), Some("b@x.io"));

        let all = SyncRequest {
            lead_ids: None,
            sync_all: true,
        };
        let outcome = sync_contacts(&h.ctx, all.clone()).await.unwrap();
        assert_eq!(outcome.synced_count, 2);

        h.ctx.sync.skip_linked = true;
        let outcome = sync_contacts(&h.ctx, all).await.unwrap();
        assert_eq!(outcome.synced_count, 0);
    }

    #[test]
    fn test_selection_rules() {
        let ids = Some(vec!["l1".to_string()]);
        let req = SyncRequest {
            lead_ids: ids.clone(),
            sync_all: false,
        };
        assert_eq!(req.selection(), LeadSelection::Ids(vec!["l1".into()]));

        let req = SyncRequest {
            lead_ids: Some(vec![]),
            sync_all: false,
        };
        assert_eq!(req.selection(), LeadSelection::Unlinked);

        let req = SyncRequest {
            lead_ids: ids,
            sync_all: true,
        };
        assert_eq!(req.selection(), LeadSelection::All);
    }
}
