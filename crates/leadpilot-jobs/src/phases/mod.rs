//! Phase handlers.
//!
//! Each handler follows the same shape: open a job, call out through
//! [`retry_with_backoff`](leadpilot_core::retry_with_backoff), persist item by
//! item, tally successes and failures, close the job, return a typed outcome.
//! Item failures are collected; only a phase-level failure fails the job.

pub mod fetch;
pub mod score;
pub mod sync;

use std::sync::Arc;

use leadpilot_core::config::{LeadPilotConfig, ScoringConfig, SyncConfig};
use leadpilot_core::error::Result;
use leadpilot_core::retry::RetryPolicy;
use leadpilot_core::traits::{ContactSource, CrmSink, LanguageModel, LeadStore};
use serde::Serialize;

use crate::joblog::JobLog;

pub use fetch::{FetchOutcome, FetchRequest, fetch_contacts};
pub use score::{ScoreOutcome, ScoreRequest, score_leads};
pub use sync::{SyncOutcome, SyncRequest, sync_contacts};

/// Shared dependencies of the three phases.
#[derive(Clone)]
pub struct PhaseContext {
    pub leads: Arc<dyn LeadStore>,
    pub jobs: JobLog,
    pub source: Arc<dyn ContactSource>,
    pub crm: Arc<dyn CrmSink>,
    pub model: Arc<dyn LanguageModel>,
    pub retry: RetryPolicy,
    pub sync: SyncConfig,
    pub scoring: ScoringConfig,
}

impl PhaseContext {
    pub fn from_config(
        config: &LeadPilotConfig,
        leads: Arc<dyn LeadStore>,
        jobs: JobLog,
        source: Arc<dyn ContactSource>,
        crm: Arc<dyn CrmSink>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            leads,
            jobs,
            source,
            crm,
            model,
            retry: RetryPolicy::from_config(&config.retry),
            sync: config.sync.clone(),
            scoring: config.scoring.clone(),
        }
    }
}

/// One item that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    #[serde(rename = "leadId")]
    pub lead_id: String,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(lead_id: &str, reason: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Close `job_id` according to `result`. A failed phase keeps its original
/// error even if recording the failure also fails.
pub(crate) fn close_job<T: Serialize>(
    jobs: &JobLog,
    job_id: &str,
    phase: &str,
    result: Result<T>,
    details: impl FnOnce(&T) -> serde_json::Value,
) -> Result<T> {
    match result {
        Ok(outcome) => {
            jobs.log_success(job_id, Some(details(&outcome)))?;
            Ok(outcome)
        }
        Err(e) => {
            tracing::error!("❌ {phase} failed: {e}");
            if let Err(log_err) = jobs.log_failure(job_id, &e.to_string(), None) {
                tracing::error!("❌ Could not record {phase} failure: {log_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fakes shared by the phase and runner tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use leadpilot_core::error::{LeadPilotError, ProviderKind, Result};
    use leadpilot_core::types::{ContactFilters, ContactProperties, CrmContact, ZoomInfoContact};
    use leadpilot_db::Datastore;

    use super::*;

    pub struct FakeSource {
        pub contacts: Vec<ZoomInfoContact>,
        pub fail_status: Option<u16>,
        pub calls: AtomicU32,
    }

    impl FakeSource {
        pub fn with(contacts: Vec<ZoomInfoContact>) -> Self {
            Self {
                contacts,
                fail_status: None,
                calls: AtomicU32::new(0),
            }
        }

        pub fn failing(status: u16) -> Self {
            Self {
                contacts: Vec::new(),
                fail_status: Some(status),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ContactSource for FakeSource {
        async fn search_contacts(
            &self,
            _filters: &ContactFilters,
            limit: u32,
        ) -> Result<Vec<ZoomInfoContact>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_status {
                return Err(LeadPilotError::provider(ProviderKind::ZoomInfo, status, "search failed"));
            }
            Ok(self.contacts.iter().take(limit as usize).cloned().collect())
        }
    }

    #[derive(Default)]
    pub struct FakeCrm {
        pub upserts: Mutex<Vec<ContactProperties>>,
        pub notes: Mutex<Vec<(String, String)>>,
        /// Emails whose upsert fails with this error status.
        pub reject: Mutex<Vec<(String, u16)>>,
    }

    #[async_trait]
    impl CrmSink for FakeCrm {
        async fn create_or_update_contact(
            &self,
            properties: &ContactProperties,
        ) -> Result<CrmContact> {
            let rejected = self
                .reject
                .lock()
                .unwrap()
                .iter()
                .find(|(email, _)| *email == properties.email)
                .map(|(_, status)| *status);
            if let Some(status) = rejected {
                return Err(LeadPilotError::provider(ProviderKind::HubSpot, status, "rejected"));
            }
            let mut upserts = self.upserts.lock().unwrap();
            upserts.push(properties.clone());
            Ok(CrmContact {
                id: format!("hs-{}", upserts.len()),
                properties: serde_json::json!({"email": properties.email}),
                created_at: None,
                updated_at: None,
            })
        }

        async fn create_contact_note(&self, contact_id: &str, body: &str) -> Result<()> {
            self.notes
                .lock()
                .unwrap()
                .push((contact_id.to_string(), body.to_string()));
            Ok(())
        }
    }

    /// Replies with canned text, in order; the last reply repeats.
    pub struct FakeModel {
        pub replies: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        pub fn replying(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop()
            } else {
                replies.last().cloned()
            };
            reply.ok_or_else(|| LeadPilotError::provider(ProviderKind::Anthropic, 500, "no reply"))
        }
    }

    pub fn contact(id: &str, email: Option<&str>) -> ZoomInfoContact {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "firstName": "Test",
            "lastName": id,
            "email": email,
            "companyName": "Acme Realty",
        }))
        .unwrap()
    }

    pub struct Harness {
        pub ctx: PhaseContext,
        pub store: Arc<Datastore>,
        pub crm: Arc<FakeCrm>,
        pub model: Arc<FakeModel>,
    }

    pub fn harness(source: FakeSource, model: FakeModel) -> Harness {
        let store = Arc::new(Datastore::open_in_memory().unwrap());
        let crm = Arc::new(FakeCrm::default());
        let model = Arc::new(model);
        let ctx = PhaseContext {
            leads: store.clone(),
            jobs: JobLog::new(store.clone()),
            source: Arc::new(source),
            crm: crm.clone(),
            model: model.clone(),
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            sync: SyncConfig::default(),
            scoring: ScoringConfig::default(),
        };
        Harness {
            ctx,
            store,
            crm,
            model,
        }
    }
}
