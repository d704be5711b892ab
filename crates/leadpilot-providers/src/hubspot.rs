//! HubSpot CRM client (v3 objects API, private-app bearer token).

use async_trait::async_trait;
use leadpilot_core::config::HubSpotConfig;
use leadpilot_core::error::{LeadPilotError, ProviderKind, Result};
use leadpilot_core::traits::CrmSink;
use leadpilot_core::types::{ContactProperties, CrmContact};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::http::{build_client, check_status, read_json, transport_error};
use crate::pagination::{ListResponse, Page, collect_pages};

const PROVIDER: ProviderKind = ProviderKind::HubSpot;

/// Note → contact association type.
const NOTE_TO_CONTACT_ASSOCIATION: u32 = 202;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CrmContact>,
}

pub struct HubSpotClient {
    base_url: String,
    access_token: String,
    page_size: u32,
    client: reqwest::Client,
}

impl HubSpotClient {
    pub fn new(config: &HubSpotConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            tracing::warn!("⚠️ Missing HubSpot access token");
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            page_size: config.page_size,
            client: build_client(PROVIDER)?,
        })
    }

    /// Create a contact; on 409 (email already exists) update it instead.
    pub async fn create_or_update_contact(
        &self,
        properties: &ContactProperties,
    ) -> Result<CrmContact> {
        let resp = self
            .client
            .post(self.url("/crm/v3/objects/contacts"))
            .bearer_auth(&self.access_token)
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if resp.status().as_u16() == 409 {
            tracing::debug!("HubSpot contact {} exists, updating", properties.email);
            return self
                .update_contact_by_email(&properties.email, properties)
                .await;
        }
        let resp = check_status(PROVIDER, resp).await?;
        read_json(PROVIDER, resp).await
    }

    /// Find a contact by exact email, then PATCH its properties.
    pub async fn update_contact_by_email(
        &self,
        email: &str,
        properties: &ContactProperties,
    ) -> Result<CrmContact> {
        let search = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": "email",
                    "operator": "EQ",
                    "value": email,
                }]
            }]
        });
        let resp = self
            .client
            .post(self.url("/crm/v3/objects/contacts/search"))
            .bearer_auth(&self.access_token)
            .json(&search)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await?;
        let found: SearchResponse = read_json(PROVIDER, resp).await?;

        let Some(existing) = found.results.into_iter().next() else {
            // Create said "exists" but search cannot see it.
            tracing::warn!("⚠️ HubSpot reported a conflict for {email} but search found nothing");
            return Err(LeadPilotError::NotFound {
                provider: PROVIDER,
                message: format!("Contact not found with email: {email}"),
            });
        };

        let resp = self
            .client
            .patch(self.url(&format!("/crm/v3/objects/contacts/{}", existing.id)))
            .bearer_auth(&self.access_token)
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await?;
        read_json(PROVIDER, resp).await
    }

    pub async fn get_contact(&self, contact_id: &str) -> Result<CrmContact> {
        self.get_json(&format!("/crm/v3/objects/contacts/{contact_id}"), &[])
            .await
    }

    /// Every contact in the portal, following the cursor to the end.
    pub async fn get_all_contacts(&self) -> Result<Vec<CrmContact>> {
        self.list_all("/crm/v3/objects/contacts").await
    }

    /// Every deal in the portal.
    pub async fn get_deals(&self) -> Result<Vec<Value>> {
        self.list_all("/crm/v3/objects/deals").await
    }

    pub async fn create_contact_note(&self, contact_id: &str, body: &str) -> Result<Value> {
        let payload = json!({
            "properties": { "hs_note_body": body },
            "associations": [{
                "to": { "id": contact_id },
                "types": [{
                    "associationCategory": "HUBSPOT_DEFINED",
                    "associationTypeId": NOTE_TO_CONTACT_ASSOCIATION,
                }]
            }]
        });
        let resp = self
            .client
            .post(self.url("/crm/v3/objects/notes"))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await?;
        read_json(PROVIDER, resp).await
    }

    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let limit = self.page_size.to_string();
        collect_pages(|after| {
            let limit = limit.clone();
            async move {
                let mut query = vec![("limit", limit)];
                if let Some(after) = after {
                    query.push(("after", after));
                }
                let page: ListResponse<T> = self.get_json(path, &query).await?;
                Ok(Page::from(page))
            }
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await?;
        read_json(PROVIDER, resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CrmSink for HubSpotClient {
    async fn create_or_update_contact(
        &self,
        properties: &ContactProperties,
    ) -> Result<CrmContact> {
        HubSpotClient::create_or_update_contact(self, properties).await
    }

    async fn create_contact_note(&self, contact_id: &str, body: &str) -> Result<()> {
        HubSpotClient::create_contact_note(self, contact_id, body)
            .await
            .map(|_| ())
    }
}
