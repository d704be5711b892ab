//! In-process trigger for the daily workflow.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::cron::CronSchedule;
use crate::runner::{PhaseDispatch, WorkflowRunner};

/// Spawn [`run_schedule`] on the runtime.
pub fn spawn_workflow_schedule(
    schedule: CronSchedule,
    runner: Arc<WorkflowRunner>,
    dispatch: Arc<dyn PhaseDispatch>,
) -> JoinHandle<()> {
    tokio::spawn(run_schedule(schedule, runner, dispatch))
}

/// Sleep until each matching minute and run the workflow. Runs never overlap:
/// the next fire time is computed after the previous run returns. Returns
/// only when the expression has no future match.
pub async fn run_schedule(
    schedule: CronSchedule,
    runner: Arc<WorkflowRunner>,
    dispatch: Arc<dyn PhaseDispatch>,
) {
    tracing::info!("⏰ Workflow schedule started ({schedule})");

    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            tracing::warn!("⚠️ Cron '{schedule}' never fires again, schedule stopped");
            return;
        };
        tracing::debug!("Next workflow run at {next}");
        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

        match runner.run(dispatch.as_ref(), "schedule").await {
            Ok(report) => tracing::info!("✅ Scheduled workflow {} finished", report.job_id),
            Err(failure) => tracing::error!("❌ Scheduled workflow failed: {failure}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joblog::JobLog;
    use crate::runner::LocalDispatch;
    use crate::phases::testing::{FakeModel, FakeSource, harness};
    use leadpilot_core::config::WorkflowConfig;
    use leadpilot_core::traits::NotificationSink;

    struct Silent;

    #[async_trait::async_trait]
    impl NotificationSink for Silent {
        async fn notify(&self, _message: &str) {}
    }

    #[tokio::test]
    async fn test_schedule_without_future_match_stops() {
        let h = harness(FakeSource::with(vec![]), FakeModel::replying(&[]));
        let runner = Arc::new(WorkflowRunner::new(
            JobLog::new(h.store.clone()),
            Arc::new(Silent),
            WorkflowConfig::default(),
        ));
        let schedule = CronSchedule::parse("0 0 30 2 *").unwrap();

        let handle = spawn_workflow_schedule(schedule, runner, Arc::new(LocalDispatch::new(h.ctx)));
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("schedule loop should exit")
            .unwrap();

        assert!(h.store.recent_jobs(10).unwrap().is_empty());
    }
}
