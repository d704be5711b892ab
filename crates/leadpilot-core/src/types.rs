//! Domain types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ─── Contact-data provider ────────────────────────────────

/// Search filters for the contact-data provider. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count_max: Option<u32>,
}

/// A contact as returned by ZoomInfo. Unknown fields are kept in `extra`
/// so the stored payload is the provider's full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomInfoContact {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<ZoomInfoCompany>,
    /// Flat output field used by the search endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ZoomInfoLocation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ZoomInfoContact {
    /// Company name from the nested object, falling back to the flat field.
    pub fn company_display(&self) -> Option<&str> {
        self.company
            .as_ref()
            .map(|c| c.name.as_str())
            .or(self.company_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomInfoCompany {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomInfoLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// ─── Leads ────────────────────────────────────────────────

/// A raw lead as persisted in `leads_raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub source_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// HubSpot contact id once synced.
    pub crm_id: Option<String>,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() { self.id.clone() } else { name }
    }
}

/// Insert payload for a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub source_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub payload: Option<Value>,
}

impl From<&ZoomInfoContact> for NewLead {
    fn from(contact: &ZoomInfoContact) -> Self {
        Self {
            source_id: Some(contact.id.clone()),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            title: contact.title.clone(),
            company: contact.company_display().map(String::from),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            payload: serde_json::to_value(contact).ok(),
        }
    }
}

/// Which leads a phase should operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadSelection {
    Ids(Vec<String>),
    /// Leads without a CRM id.
    Unlinked,
    All,
}

// ─── Scores & research ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub id: String,
    pub lead_id: String,
    pub crm_id: Option<String>,
    pub score: f64,
    pub rationale: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLeadScore {
    pub lead_id: String,
    pub crm_id: Option<String>,
    pub score: f64,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadResearch {
    pub id: String,
    pub lead_id: String,
    pub summary_text: Option<String>,
    pub sources: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLeadResearch {
    pub lead_id: String,
    pub summary_text: Option<String>,
    pub sources: Option<Value>,
}

// ─── Jobs ─────────────────────────────────────────────────

/// Job lifecycle status. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub details: Option<Value>,
    pub error_message: Option<String>,
    pub run_time: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Overwrite applied by `JobStore::update_job`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub details: Option<Value>,
    pub error_message: Option<String>,
}

/// Per-type aggregate over a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTypeStats {
    pub success: u32,
    pub failed: u32,
    pub total: u32,
}

// ─── CRM ──────────────────────────────────────────────────

/// HubSpot contact properties used for upserts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactProperties {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactProperties {
    /// Build CRM properties from a lead. `None` when the lead has no email.
    pub fn from_lead(lead: &Lead) -> Option<Self> {
        let email = lead.email.as_deref().filter(|e| !e.trim().is_empty())?;
        Some(Self {
            email: email.to_string(),
            firstname: lead.first_name.clone(),
            lastname: lead.last_name.clone(),
            company: lead.company.clone(),
            jobtitle: lead.title.clone(),
            phone: lead.phone.clone(),
            extra: Map::new(),
        })
    }
}

/// A contact (or any CRM object) as returned by HubSpot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmContact {
    pub id: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoominfo_contact_numeric_id_and_extra_fields() {
        let contact: ZoomInfoContact = serde_json::from_value(serde_json::json!({
            "id": 12345,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "companyName": "Analytical Engines",
            "city": "London"
        }))
        .unwrap();

        assert_eq!(contact.id, "12345");
        assert_eq!(contact.company_display(), Some("Analytical Engines"));
        assert_eq!(contact.extra["city"], "London");

        let lead = NewLead::from(&contact);
        assert_eq!(lead.source_id.as_deref(), Some("12345"));
        assert_eq!(lead.company.as_deref(), Some("Analytical Engines"));
        assert_eq!(lead.payload.as_ref().unwrap()["city"], "London");
    }

    #[test]
    fn test_nested_company_wins() {
        let contact: ZoomInfoContact = serde_json::from_value(serde_json::json!({
            "id": "z-1",
            "company": {"name": "Nested Co", "employeeCount": 40},
            "companyName": "Flat Co"
        }))
        .unwrap();
        assert_eq!(contact.company_display(), Some("Nested Co"));
    }

    #[test]
    fn test_filters_serialize_only_set_fields() {
        let filters = ContactFilters {
            industry: Some("Real Estate".into()),
            employee_count_min: Some(10),
            ..ContactFilters::default()
        };
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"industry": "Real Estate", "employeeCountMin": 10})
        );
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
        assert_eq!(JobStatus::parse("retrying"), Some(JobStatus::Retrying));
        assert_eq!(JobStatus::parse("done"), None);
    }

    #[test]
    fn test_contact_properties_require_email() {
        let mut lead = Lead {
            id: "l1".into(),
            source_id: None,
            first_name: Some("Grace".into()),
            last_name: Some("Hopper".into()),
            title: Some("Rear Admiral".into()),
            company: Some("Navy".into()),
            email: None,
            phone: None,
            crm_id: None,
            payload: None,
            created_at: Utc::now(),
        };
        assert!(ContactProperties::from_lead(&lead).is_none());

        lead.email = Some("  ".into());
        assert!(ContactProperties::from_lead(&lead).is_none());

        lead.email = Some("grace@navy.mil".into());
        let props = ContactProperties::from_lead(&lead).unwrap();
        assert_eq!(props.jobtitle.as_deref(), Some("Rear Admiral"));
        let json = serde_json::to_value(&props).unwrap();
        assert!(json.get("phone").is_none());
        assert_eq!(lead.display_name(), "Grace Hopper");
    }
}
