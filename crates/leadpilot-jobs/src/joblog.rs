//! Job lifecycle logging on top of a [`JobStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use leadpilot_core::error::Result;
use leadpilot_core::traits::JobStore;
use leadpilot_core::types::{JobStatus, JobTypeStats, JobUpdate};
use serde_json::Value;

#[derive(Clone)]
pub struct JobLog {
    store: Arc<dyn JobStore>,
}

impl JobLog {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Insert a `running` job and return its id. Write failures propagate.
    pub fn create_job(&self, job_type: &str, details: Option<Value>) -> Result<String> {
        match self.store.insert_job(job_type, details.as_ref()) {
            Ok(job) => {
                tracing::debug!("Job {} started ({})", job.id, job_type);
                Ok(job.id)
            }
            Err(e) => {
                tracing::error!("❌ Failed to create job log: {e}");
                Err(e)
            }
        }
    }

    pub fn update_job(
        &self,
        job_id: &str,
        status: JobStatus,
        details: Option<Value>,
        error_message: Option<String>,
    ) -> Result<()> {
        let update = JobUpdate {
            status,
            details,
            error_message,
        };
        self.store.update_job(job_id, &update).inspect_err(|e| {
            tracing::error!("❌ Failed to update job log {job_id}: {e}");
        })
    }

    pub fn log_success(&self, job_id: &str, details: Option<Value>) -> Result<()> {
        self.update_job(job_id, JobStatus::Success, details, None)
    }

    pub fn log_failure(&self, job_id: &str, error: &str, details: Option<Value>) -> Result<()> {
        self.update_job(job_id, JobStatus::Failed, details, Some(error.to_string()))
    }

    /// Per-type totals for jobs started in the last `hours`. `None` if the
    /// store cannot be queried. Windows reaching past the epoch count every job.
    pub fn get_job_stats(&self, hours: u32) -> Option<BTreeMap<String, JobTypeStats>> {
        let since = Utc::now()
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .filter(|since| *since > DateTime::<Utc>::UNIX_EPOCH)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let rows = match self.store.job_statuses_since(since) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("❌ Failed to get job stats: {e}");
                return None;
            }
        };

        let mut stats: BTreeMap<String, JobTypeStats> = BTreeMap::new();
        for (job_type, status) in rows {
            let entry = stats.entry(job_type).or_default();
            entry.total += 1;
            match status {
                JobStatus::Success => entry.success += 1,
                JobStatus::Failed => entry.failed += 1,
                _ => {}
            }
        }
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadpilot_core::LeadPilotError;
    use leadpilot_core::types::Job;
    use leadpilot_db::Datastore;
    use serde_json::json;

    /// A store whose every call fails.
    struct BrokenStore;

    impl JobStore for BrokenStore {
        fn insert_job(&self, _: &str, _: Option<&Value>) -> Result<Job> {
            Err(LeadPilotError::Database("disk I/O error".into()))
        }
        fn update_job(&self, _: &str, _: &JobUpdate) -> Result<()> {
            Err(LeadPilotError::Database("disk I/O error".into()))
        }
        fn get_job(&self, _: &str) -> Result<Option<Job>> {
            Err(LeadPilotError::Database("disk I/O error".into()))
        }
        fn job_statuses_since(&self, _: DateTime<Utc>) -> Result<Vec<(String, JobStatus)>> {
            Err(LeadPilotError::Database("disk I/O error".into()))
        }
    }

    fn log_with_store() -> (JobLog, Arc<Datastore>) {
        let store = Arc::new(Datastore::open_in_memory().unwrap());
        (JobLog::new(store.clone()), store)
    }

    #[test]
    fn test_lifecycle() {
        let (log, store) = log_with_store();
        let id = log
            .create_job("zoominfo_fetch", Some(json!({"request": {}})))
            .unwrap();
        log.log_success(&id, Some(json!({"contacts_fetched": 3})))
            .unwrap();

        let job = store.get_job(&id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.details.unwrap()["contacts_fetched"], 3);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_failure_records_message() {
        let (log, store) = log_with_store();
        let id = log.create_job("hubspot_sync", None).unwrap();
        log.log_failure(&id, "HubSpot API error (500): boom", None)
            .unwrap();
        let job = store.get_job(&id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("HubSpot API error (500): boom"));
    }

    #[test]
    fn test_stats_tally_per_type() {
        let (log, _store) = log_with_store();
        let a = log.create_job("hubspot_sync", None).unwrap();
        let b = log.create_job("hubspot_sync", None).unwrap();
        log.create_job("hubspot_sync", None).unwrap();
        let c = log.create_job("lead_scoring", None).unwrap();
        log.log_success(&a, None).unwrap();
        log.log_failure(&b, "x", None).unwrap();
        log.log_success(&c, None).unwrap();

        let stats = log.get_job_stats(24).unwrap();
        assert_eq!(
            stats["hubspot_sync"],
            JobTypeStats {
                success: 1,
                failed: 1,
                total: 3
            }
        );
        assert_eq!(stats["lead_scoring"].total, 1);
    }

    #[test]
    fn test_stats_huge_window_does_not_panic() {
        let (log, _store) = log_with_store();
        let id = log.create_job("zoominfo_fetch", None).unwrap();
        log.log_success(&id, None).unwrap();

        for hours in [1_752_000_000, u32::MAX] {
            let stats = log.get_job_stats(hours).unwrap();
            assert_eq!(stats["zoominfo_fetch"].success, 1, "{hours}");
        }
    }

    #[test]
    fn test_stats_unavailable_is_none() {
        let log = JobLog::new(Arc::new(BrokenStore));
        assert!(log.get_job_stats(24).is_none());
    }

    #[test]
    fn test_write_failures_propagate() {
        let log = JobLog::new(Arc::new(BrokenStore));
        assert!(log.create_job("workflow_runner", None).is_err());
        assert!(log.log_success("job-1", None).is_err());
    }
}
