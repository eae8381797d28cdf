//! REST client for the contact store.

use crate::error::{StoreError, StoreResult};
use crate::{ContactDocument, ContactStore};
use async_trait::async_trait;
use contact_types::PinMarker;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

/// Rows requested per page when reading a whole collection.
const PAGE_SIZE: usize = 1000;

const CONTACTS_TABLE: &str = "contacts";
const PIN_MARKERS_TABLE: &str = "pinned_chats";

/// Credentials for the store REST API.
#[derive(Clone)]
pub struct StoreCredentials {
    pub api_key: String,
    pub access_token: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials").finish_non_exhaustive()
    }
}

/// Store REST API client.
#[derive(Clone)]
pub struct RestContactStore {
    http_client: reqwest::Client,
    api_url: String,
    credentials: StoreCredentials,
}

impl RestContactStore {
    /// Create a new store client.
    ///
    /// # Arguments
    /// * `api_url` - The store base URL (e.g., `https://store.example.com`)
    /// * `credentials` - API key plus the signed-in user's access token
    pub fn new(api_url: impl Into<String>, credentials: StoreCredentials) -> StoreResult<Self> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(StoreError::Config("store URL is empty".to_string()));
        }
        Ok(Self {
            http_client: reqwest::Client::new(),
            api_url,
            credentials,
        })
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Read every row matching `filter` from `table`, page by page.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: (&str, String),
    ) -> StoreResult<Vec<T>> {
        let url = self.rest_url(table);
        let mut rows: Vec<T> = Vec::new();
        let mut offset = 0usize;

        loop {
            let response = self
                .http_client
                .get(&url)
                .header("apikey", &self.credentials.api_key)
                .header(
                    "Authorization",
                    format!("Bearer {}", self.credentials.access_token),
                )
                .header("Accept", "application/json")
                .query(&[
                    (filter.0, filter.1.as_str()),
                    ("select", "*"),
                    ("order", "id.asc"),
                ])
                .query(&[("limit", PAGE_SIZE), ("offset", offset)])
                .send()
                .await?;

            let response = check_response(response).await?;
            let page: Vec<T> = response.json().await?;
            let page_len = page.len();
            rows.extend(page);

            debug!(table, page_len, total = rows.len(), "Fetched store page");

            if page_len < PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        Ok(rows)
    }
}

#[async_trait]
impl ContactStore for RestContactStore {
    async fn fetch_contacts(&self, tenant_id: &str) -> StoreResult<Vec<ContactDocument>> {
        debug!(tenant_id, "Fetching contacts");
        self.fetch_all(CONTACTS_TABLE, ("tenantId", format!("eq.{}", tenant_id)))
            .await
    }

    async fn fetch_pin_markers(&self, user_id: &str) -> StoreResult<Vec<PinMarker>> {
        debug!(user_id, "Fetching pin markers");
        self.fetch_all(PIN_MARKERS_TABLE, ("userId", format!("eq.{}", user_id)))
            .await
    }

    async fn merge_contact_pinned(
        &self,
        tenant_id: &str,
        contact_id: &str,
        pinned: bool,
    ) -> StoreResult<()> {
        let id_filter = format!("eq.{}", contact_id);
        let tenant_filter = format!("eq.{}", tenant_id);
        let response = self
            .http_client
            .patch(self.rest_url(CONTACTS_TABLE))
            .header("apikey", &self.credentials.api_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.access_token),
            )
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .query(&[("id", id_filter.as_str()), ("tenantId", tenant_filter.as_str())])
            .json(&serde_json::json!({ "pinned": pinned }))
            .send()
            .await?;

        let response = check_response(response).await?;
        let updated: Vec<serde_json::Value> = response.json().await?;
        if updated.is_empty() {
            return Err(StoreError::NotFound(contact_id.to_string()));
        }

        debug!(contact_id, pinned, "Merged pinned flag");
        Ok(())
    }
}

/// Check HTTP response for errors.
async fn check_response(response: reqwest::Response) -> StoreResult<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!("Store request failed: {} - {}", status, body);
        return Err(StoreError::Store {
            status,
            message: body,
        });
    }
    Ok(response)
}

impl std::fmt::Debug for RestContactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestContactStore")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
