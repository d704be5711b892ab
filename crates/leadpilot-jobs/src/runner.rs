//! Workflow runner.
//!
//! Runs the fixed pipeline fetch → sync → score. Every phase produces a
//! `Result`; a failure lands as `{"error": ...}` in that phase's slot and the
//! next phase runs anyway. The runner's own job is marked failed only when
//! something outside the phase slots fails (e.g. the final job write).

use std::sync::Arc;

use async_trait::async_trait;
use leadpilot_core::config::WorkflowConfig;
use leadpilot_core::error::{LeadPilotError, Result};
use leadpilot_core::traits::NotificationSink;
use serde::Serialize;
use serde_json::{Value, json};

use crate::joblog::JobLog;
use crate::phases::{self, FetchRequest, PhaseContext, ScoreRequest, SyncRequest};

pub const JOB_TYPE: &str = "workflow_runner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Sync,
    Score,
}

impl Phase {
    pub const PIPELINE: [Phase; 3] = [Phase::Fetch, Phase::Sync, Phase::Score];

    /// Key of this phase in the workflow results.
    pub fn slot(&self) -> &'static str {
        match self {
            Self::Fetch => "phase_1_fetch",
            Self::Sync => "phase_1_sync",
            Self::Score => "phase_2_scoring",
        }
    }

    /// Gateway route serving this phase.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Fetch => "/fetch-contacts",
            Self::Sync => "/sync-contacts",
            Self::Score => "/score-leads",
        }
    }

    /// Request body the workflow sends to this phase.
    pub fn workflow_body(&self, config: &WorkflowConfig) -> Value {
        match self {
            Self::Fetch => json!({
                "filters": config.fetch_filters,
                "limit": config.fetch_limit,
            }),
            Self::Sync => json!({ "syncAll": false }),
            Self::Score => json!({ "scoreAll": true }),
        }
    }
}

/// How the runner reaches a phase handler.
#[async_trait]
pub trait PhaseDispatch: Send + Sync {
    async fn dispatch(&self, phase: Phase, body: Value) -> Result<Value>;
}

/// Calls the gateway's own phase endpoints over HTTP. Whatever JSON comes
/// back, success or error body, is the phase's result.
pub struct HttpDispatch {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDispatch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PhaseDispatch for HttpDispatch {
    async fn dispatch(&self, phase: Phase, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, phase.path());
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadPilotError::Dispatch(format!("{url} unreachable: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LeadPilotError::Dispatch(format!("{url} body unreadable: {e}")))?;
        serde_json::from_str(&text).map_err(|e| {
            LeadPilotError::Dispatch(format!("{url} returned {status} with invalid JSON: {e}"))
        })
    }
}

/// Invokes the phase handlers in-process.
pub struct LocalDispatch {
    ctx: PhaseContext,
}

impl LocalDispatch {
    pub fn new(ctx: PhaseContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PhaseDispatch for LocalDispatch {
    async fn dispatch(&self, phase: Phase, body: Value) -> Result<Value> {
        let outcome = match phase {
            Phase::Fetch => {
                let req: FetchRequest = serde_json::from_value(body)?;
                serde_json::to_value(phases::fetch_contacts(&self.ctx, req).await?)?
            }
            Phase::Sync => {
                let req: SyncRequest = serde_json::from_value(body)?;
                serde_json::to_value(phases::sync_contacts(&self.ctx, req).await?)?
            }
            Phase::Score => {
                let req: ScoreRequest = serde_json::from_value(body)?;
                serde_json::to_value(phases::score_leads(&self.ctx, req).await?)?
            }
        };
        Ok(outcome)
    }
}

/// One phase's slot in the workflow results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PhaseSlot {
    Completed(Value),
    Failed { error: String },
}

impl PhaseSlot {
    fn count(&self, field: &str) -> u64 {
        match self {
            Self::Completed(v) => v.get(field).and_then(Value::as_u64).unwrap_or(0),
            Self::Failed { .. } => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl From<Result<Value>> for PhaseSlot {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResults {
    pub phase_1_fetch: PhaseSlot,
    pub phase_1_sync: PhaseSlot,
    pub phase_2_scoring: PhaseSlot,
}

impl WorkflowResults {
    /// Operator summary built from the counters each slot carries.
    pub fn summary(&self) -> String {
        [
            "🤖 *Autopilot Daily Run Summary*\n".to_string(),
            format!(
                "📥 *Fetch*: {}/{} contacts saved",
                self.phase_1_fetch.count("contacts_inserted"),
                self.phase_1_fetch.count("contacts_fetched")
            ),
            format!(
                "🔄 *HubSpot Sync*: {} synced, {} failed",
                self.phase_1_sync.count("synced_count"),
                self.phase_1_sync.count("failed_count")
            ),
            format!(
                "🎯 *Scoring*: {} leads scored",
                self.phase_2_scoring.count("scored_count")
            ),
        ]
        .join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub success: bool,
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub results: WorkflowResults,
}

/// The workflow body failed outside any phase slot.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct WorkflowFailure {
    /// `None` when the workflow job itself could not be created.
    pub job_id: Option<String>,
    pub error: LeadPilotError,
}

pub struct WorkflowRunner {
    jobs: JobLog,
    notifier: Arc<dyn NotificationSink>,
    workflow: WorkflowConfig,
}

impl WorkflowRunner {
    pub fn new(jobs: JobLog, notifier: Arc<dyn NotificationSink>, workflow: WorkflowConfig) -> Self {
        Self {
            jobs,
            notifier,
            workflow,
        }
    }

    /// Run all three phases through `dispatch`. `trigger` is recorded on the job.
    pub async fn run(
        &self,
        dispatch: &dyn PhaseDispatch,
        trigger: &str,
    ) -> std::result::Result<WorkflowReport, WorkflowFailure> {
        let job_id = self
            .jobs
            .create_job(JOB_TYPE, Some(json!({ "trigger": trigger })))
            .map_err(|error| WorkflowFailure {
                job_id: None,
                error,
            })?;
        tracing::info!("🚀 Workflow {job_id} started ({trigger})");

        match self.run_phases(dispatch, &job_id).await {
            Ok(results) => Ok(WorkflowReport {
                success: true,
                job_id,
                results,
            }),
            Err(error) => {
                tracing::error!("❌ Job runner failed: {error}");
                if let Err(log_err) = self.jobs.log_failure(&job_id, &error.to_string(), None) {
                    tracing::error!("❌ Could not record workflow failure: {log_err}");
                }
                self.notifier
                    .notify(&format!("❌ Job runner failed: {error}"))
                    .await;
                Err(WorkflowFailure {
                    job_id: Some(job_id),
                    error,
                })
            }
        }
    }

    async fn run_phases(&self, dispatch: &dyn PhaseDispatch, job_id: &str) -> Result<WorkflowResults> {
        let results = WorkflowResults {
            phase_1_fetch: self.run_phase(dispatch, Phase::Fetch).await,
            phase_1_sync: self.run_phase(dispatch, Phase::Sync).await,
            phase_2_scoring: self.run_phase(dispatch, Phase::Score).await,
        };

        self.notifier.notify(&results.summary()).await;
        self.jobs
            .log_success(job_id, Some(serde_json::to_value(&results)?))?;
        tracing::info!("✅ Workflow {job_id} complete");
        Ok(results)
    }

    async fn run_phase(&self, dispatch: &dyn PhaseDispatch, phase: Phase) -> PhaseSlot {
        tracing::info!("▶️ Running {}", phase.slot());
        let slot = PhaseSlot::from(
            dispatch
                .dispatch(phase, phase.workflow_body(&self.workflow))
                .await,
        );
        if let PhaseSlot::Failed { error } = &slot {
            tracing::warn!("⚠️ {} failed: {error}", phase.slot());
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{FakeModel, FakeSource, contact, harness};
    use chrono::{DateTime, Utc};
    use leadpilot_core::ProviderKind;
    use leadpilot_core::traits::JobStore;
    use leadpilot_core::types::{Job, JobStatus, JobUpdate};
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    struct FailingDispatch {
        calls: Mutex<Vec<Phase>>,
    }

    #[async_trait]
    impl PhaseDispatch for FailingDispatch {
        async fn dispatch(&self, phase: Phase, _body: Value) -> Result<Value> {
            self.calls.lock().unwrap().push(phase);
            Err(LeadPilotError::provider(ProviderKind::HubSpot, 503, "down"))
        }
    }

    #[tokio::test]
    async fn test_all_phases_failing_still_succeeds() {
        let h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        let sink = Arc::new(RecordingSink::default());
        let runner = WorkflowRunner::new(h.ctx.jobs.clone(), sink.clone(), WorkflowConfig::default());
        let dispatch = FailingDispatch {
            calls: Mutex::new(Vec::new()),
        };

        let report = runner.run(&dispatch, "POST").await.unwrap();

        assert_eq!(*dispatch.calls.lock().unwrap(), Phase::PIPELINE.to_vec());
        assert!(report.results.phase_1_fetch.is_failed());
        assert!(report.results.phase_1_sync.is_failed());
        assert!(report.results.phase_2_scoring.is_failed());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json["results"]["phase_1_sync"]["error"],
            "HubSpot API error (503): down"
        );

        let job = h.store.get_job(&report.job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.details.unwrap()["phase_2_scoring"]["error"], "HubSpot API error (503): down");

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("📥 *Fetch*: 0/0 contacts saved"));
    }

    #[tokio::test]
    async fn test_local_dispatch_runs_pipeline() {
        let h = harness(
            FakeSource::with(vec![
                contact("1", Some("a@acme.com")),
                contact("2", None),
            ]),
            FakeModel::replying(&["{\"score\": 61, \"rationale\": \"ok\"}"]),
        );
        let sink = Arc::new(RecordingSink::default());
        let runner = WorkflowRunner::new(h.ctx.jobs.clone(), sink.clone(), WorkflowConfig::default());

        let report = runner
            .run(&LocalDispatch::new(h.ctx.clone()), "cli")
            .await
            .unwrap();

        let summary = report.results.summary();
        assert_eq!(
            summary,
            "🤖 *Autopilot Daily Run Summary*\n\n\
             📥 *Fetch*: 2/2 contacts saved\n\
             🔄 *HubSpot Sync*: 1 synced, 1 failed\n\
             🎯 *Scoring*: 2 leads scored"
        );
        assert_eq!(sink.messages.lock().unwrap()[0], summary);

        let stats = h.ctx.jobs.get_job_stats(1).unwrap();
        for job_type in ["workflow_runner", "zoominfo_fetch", "hubspot_sync", "lead_scoring"] {
            assert_eq!(stats[job_type].success, 1, "{job_type}");
        }
    }

    #[tokio::test]
    async fn test_http_dispatch_posts_workflow_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fetch-contacts"))
            .and(body_json(json!({
                "filters": {"industry": "Real Estate", "employeeCountMin": 10},
                "limit": 50
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "contacts_fetched": 4, "contacts_inserted": 3, "jobId": "j1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sync-contacts"))
            .and(body_json(json!({"syncAll": false})))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "HubSpot API error (500): boom", "code": "HUBSPOT_ERROR"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/score-leads"))
            .and(body_json(json!({"scoreAll": true})))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        let sink = Arc::new(RecordingSink::default());
        let runner = WorkflowRunner::new(h.ctx.jobs.clone(), sink.clone(), WorkflowConfig::default());

        let report = runner
            .run(&HttpDispatch::new(server.uri()), "GET")
            .await
            .unwrap();

        assert_eq!(report.results.phase_1_fetch.count("contacts_inserted"), 3);
        // A JSON error body is still a completed call.
        assert!(!report.results.phase_1_sync.is_failed());
        assert!(report.results.phase_2_scoring.is_failed());
        assert!(sink.messages.lock().unwrap()[0].contains("3/4 contacts saved"));
    }

    /// Inserts normally but refuses every update.
    struct ReadOnlyJobs(Arc<leadpilot_db::Datastore>);

    impl JobStore for ReadOnlyJobs {
        fn insert_job(&self, job_type: &str, details: Option<&Value>) -> Result<Job> {
            self.0.insert_job(job_type, details)
        }
        fn update_job(&self, job_id: &str, _update: &JobUpdate) -> Result<()> {
            Err(LeadPilotError::Database(format!("write rejected for {job_id}")))
        }
        fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
            self.0.get_job(job_id)
        }
        fn job_statuses_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, JobStatus)>> {
            self.0.job_statuses_since(since)
        }
    }

    struct EmptyDispatch;

    #[async_trait]
    impl PhaseDispatch for EmptyDispatch {
        async fn dispatch(&self, _phase: Phase, _body: Value) -> Result<Value> {
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn test_final_job_write_failure_fails_workflow() {
        let store = Arc::new(leadpilot_db::Datastore::open_in_memory().unwrap());
        let sink = Arc::new(RecordingSink::default());
        let runner = WorkflowRunner::new(
            JobLog::new(Arc::new(ReadOnlyJobs(store.clone()))),
            sink.clone(),
            WorkflowConfig::default(),
        );

        let failure = runner.run(&EmptyDispatch, "POST").await.unwrap_err();
        let job_id = failure.job_id.clone().unwrap();
        assert!(failure.to_string().contains("write rejected"));
        assert_eq!(
            store.get_job(&job_id).unwrap().unwrap().status,
            JobStatus::Running
        );

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].starts_with("❌ Job runner failed: Database error: write rejected"));
    }

    #[test]
    fn test_summary_defaults_missing_counters_to_zero() {
        let results = WorkflowResults {
            phase_1_fetch: PhaseSlot::Completed(json!({"contacts_fetched": 7})),
            phase_1_sync: PhaseSlot::Failed {
                error: "boom".into(),
            },
            phase_2_scoring: PhaseSlot::Completed(json!({"error": "x", "code": "CLAUDE_ERROR"})),
        };
        let summary = results.summary();
        assert!(summary.contains("📥 *Fetch*: 0/7 contacts saved"));
        assert!(summary.contains("🔄 *HubSpot Sync*: 0 synced, 0 failed"));
        assert!(summary.contains("🎯 *Scoring*: 0 leads scored"));
    }
}
