//! ZoomInfo client.
//!
//! Authenticates with username/password and reuses the returned JWT until a
//! locally computed expiry (50 minutes by default, under the real one-hour
//! lifetime). The token lives behind an async mutex, so concurrent callers
//! that find it missing or stale wait for a single refresh.

use std::time::Duration;

use async_trait::async_trait;
use leadpilot_core::config::ZoomInfoConfig;
use leadpilot_core::error::{LeadPilotError, ProviderKind, Result};
use leadpilot_core::traits::ContactSource;
use leadpilot_core::types::{ContactFilters, ZoomInfoContact};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::http::{build_client, check_status, read_json, transport_error};

const PROVIDER: ProviderKind = ProviderKind::ZoomInfo;

const SEARCH_OUTPUT_FIELDS: &[&str] = &[
    "id",
    "firstName",
    "lastName",
    "email",
    "phone",
    "title",
    "companyName",
    "companyWebsite",
    "companyIndustry",
    "companyRevenue",
    "companyEmployeeCount",
    "city",
    "state",
    "country",
];

const ENRICH_OUTPUT_FIELDS: &[&str] = &[
    "id",
    "firstName",
    "lastName",
    "email",
    "phone",
    "title",
    "companyName",
    "companyWebsite",
    "companyIndustry",
];

struct CachedToken {
    jwt: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Vec<Value>,
}

impl DataResponse {
    /// Decode each record on its own; malformed ones are logged and dropped.
    fn into_contacts(self) -> Vec<ZoomInfoContact> {
        self.data
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(contact) => Some(contact),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping malformed ZoomInfo record: {e}");
                    None
                }
            })
            .collect()
    }
}

pub struct ZoomInfoClient {
    base_url: String,
    username: String,
    password: String,
    token_ttl: Duration,
    token: Mutex<Option<CachedToken>>,
    client: reqwest::Client,
}

impl ZoomInfoClient {
    pub fn new(config: &ZoomInfoConfig) -> Result<Self> {
        if config.username.is_empty() || config.password.is_empty() {
            tracing::warn!("⚠️ Missing ZoomInfo credentials");
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token_ttl: Duration::from_secs(config.token_ttl_secs),
            token: Mutex::new(None),
            client: build_client(PROVIDER)?,
        })
    }

    /// Return the cached JWT, or log in again if it is missing or expired.
    pub async fn authenticate(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.jwt.clone());
            }
        }

        tracing::debug!("ZoomInfo token missing or expired, authenticating");
        let resp = self
            .client
            .post(format!("{}/authenticate", self.base_url))
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await.map_err(|e| match e {
            LeadPilotError::Provider { status, message, .. } => LeadPilotError::provider(
                PROVIDER,
                status,
                format!("authentication failed: {message}"),
            ),
            other => other,
        })?;
        let auth: AuthResponse = read_json(PROVIDER, resp).await?;

        *guard = Some(CachedToken {
            jwt: auth.jwt.clone(),
            expires_at: Instant::now() + self.token_ttl,
        });
        Ok(auth.jwt)
    }

    /// Search contacts. Only the filters that are set are sent.
    pub async fn search_contacts(
        &self,
        filters: &ContactFilters,
        limit: u32,
    ) -> Result<Vec<ZoomInfoContact>> {
        let mut body = json!({
            "outputFields": SEARCH_OUTPUT_FIELDS,
            "maxResults": limit,
        });
        let query_filters = build_query_filters(filters);
        if !query_filters.is_empty() {
            body["query"] = json!({ "filters": query_filters });
        }

        let data: DataResponse = self.post_authed("/search/contact", &body).await?;
        let mut contacts = data.into_contacts();
        contacts.truncate(limit as usize);
        tracing::debug!("ZoomInfo search returned {} contacts", contacts.len());
        Ok(contacts)
    }

    /// Look up one contact by email. Any failure, including no match, is `None`.
    pub async fn enrich_contact_by_email(&self, email: &str) -> Option<ZoomInfoContact> {
        let body = json!({
            "matchPersonInput": [{ "email": email }],
            "outputFields": ENRICH_OUTPUT_FIELDS,
        });
        match self.post_authed::<DataResponse>("/enrich/contact", &body).await {
            Ok(data) => data.into_contacts().into_iter().next(),
            Err(e) => {
                tracing::warn!("⚠️ Failed to enrich contact: {e}");
                None
            }
        }
    }

    /// Run several searches in one request.
    pub async fn bulk_contact_search(
        &self,
        criteria: &[Value],
        limit: u32,
    ) -> Result<Vec<ZoomInfoContact>> {
        let body = json!({
            "searches": criteria,
            "maxResults": limit,
        });
        let data: DataResponse = self.post_authed("/search/contact/bulk", &body).await?;
        Ok(data.into_contacts())
    }

    /// Authenticate and run a one-result search.
    pub async fn check(&self) -> Result<usize> {
        self.authenticate().await?;
        let contacts = self.search_contacts(&ContactFilters::default(), 1).await?;
        Ok(contacts.len())
    }

    async fn post_authed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        let token = self.authenticate().await?;
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await?;
        read_json(PROVIDER, resp).await
    }
}

fn build_query_filters(filters: &ContactFilters) -> Vec<Value> {
    let mut out = Vec::new();
    if let Some(name) = filters.company_name.as_deref().filter(|s| !s.is_empty()) {
        out.push(json!({ "field": "companyName", "value": name }));
    }
    if let Some(industry) = filters.industry.as_deref().filter(|s| !s.is_empty()) {
        out.push(json!({ "field": "companyIndustry", "value": industry }));
    }
    if let Some(location) = filters.location.as_deref().filter(|s| !s.is_empty()) {
        out.push(json!({ "field": "location", "value": location }));
    }
    if filters.revenue_min.is_some() || filters.revenue_max.is_some() {
        out.push(range_filter("companyRevenue", filters.revenue_min, filters.revenue_max));
    }
    if filters.employee_count_min.is_some() || filters.employee_count_max.is_some() {
        out.push(range_filter(
            "companyEmployeeCount",
            filters.employee_count_min.map(u64::from),
            filters.employee_count_max.map(u64::from),
        ));
    }
    out
}

fn range_filter(field: &str, min: Option<u64>, max: Option<u64>) -> Value {
    let mut filter = json!({ "field": field });
    if let Some(min) = min {
        filter["min"] = json!(min);
    }
    if let Some(max) = max {
        filter["max"] = json!(max);
    }
    filter
}

#[async_trait]
impl ContactSource for ZoomInfoClient {
    async fn search_contacts(
        &self,
        filters: &ContactFilters,
        limit: u32,
    ) -> Result<Vec<ZoomInfoContact>> {
        ZoomInfoClient::search_contacts(self, filters, limit).await
    }
}
