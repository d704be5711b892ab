//! Seam traits.
//!
//! Stores are synchronous (SQLite behind a mutex); everything that talks to
//! the network is async.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::types::{
    ContactFilters, ContactProperties, CrmContact, Job, JobStatus, JobUpdate, Lead, LeadResearch,
    LeadScore, LeadSelection, NewLead, NewLeadResearch, NewLeadScore, ZoomInfoContact,
};

/// Persistence for leads, scores and research.
pub trait LeadStore: Send + Sync {
    fn insert_lead(&self, lead: &NewLead) -> Result<Lead>;

    fn select_leads(&self, selection: &LeadSelection) -> Result<Vec<Lead>>;

    /// Attach a CRM id. Setting the same id twice is a no-op.
    fn set_crm_id(&self, lead_id: &str, crm_id: &str) -> Result<()>;

    /// Leads with no row in `leads_scored`, oldest first. With `linked_only`,
    /// only leads that already carry a CRM id.
    fn unscored_leads(&self, linked_only: bool, limit: u32) -> Result<Vec<Lead>>;

    fn insert_score(&self, score: &NewLeadScore) -> Result<LeadScore>;

    fn scores_for_lead(&self, lead_id: &str) -> Result<Vec<LeadScore>>;

    fn insert_research(&self, research: &NewLeadResearch) -> Result<LeadResearch>;

    fn research_for_lead(&self, lead_id: &str) -> Result<Vec<LeadResearch>>;
}

/// Persistence for job records.
pub trait JobStore: Send + Sync {
    /// Insert a job in `running` state with `run_time = now`.
    fn insert_job(&self, job_type: &str, details: Option<&Value>) -> Result<Job>;

    /// Overwrite status/details/error. Terminal statuses stamp `completed_at`.
    /// A job already in a terminal state is never moved.
    fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<()>;

    fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// `(type, status)` of every job started at or after `since`.
    fn job_statuses_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, JobStatus)>>;
}

/// Contact-data provider.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn search_contacts(
        &self,
        filters: &ContactFilters,
        limit: u32,
    ) -> Result<Vec<ZoomInfoContact>>;
}

/// CRM write side.
#[async_trait]
pub trait CrmSink: Send + Sync {
    /// Create the contact, or update the existing one with the same email.
    async fn create_or_update_contact(&self, properties: &ContactProperties)
    -> Result<CrmContact>;

    /// Attach a plain-text note to a contact.
    async fn create_contact_note(&self, contact_id: &str, body: &str) -> Result<()>;
}

/// Text-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String>;
}

/// Operator notification channel. Implementations swallow their own errors.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &str);
}
