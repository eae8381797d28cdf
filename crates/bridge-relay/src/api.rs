//! One-shot HTTP calls to the bridge.

use crate::messages::{PairingCodeRequest, PairingCodeResponse, StatusReport};
use crate::{RelayError, RelayResult};
use async_trait::async_trait;
use tracing::{debug, error};

/// HTTP surface of the bridge.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Current session status for a tenant.
    async fn probe_status(&self, tenant_id: &str) -> RelayResult<StatusReport>;

    /// Ask the bridge for a device pairing code bound to `phone_number`.
    async fn request_pairing_code(&self, tenant_id: &str, phone_number: &str)
        -> RelayResult<String>;
}

/// reqwest implementation of [`BridgeApi`].
#[derive(Clone)]
pub struct BridgeHttpClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl BridgeHttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str, tenant_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, path, tenant_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BridgeApi for BridgeHttpClient {
    async fn probe_status(&self, tenant_id: &str) -> RelayResult<StatusReport> {
        let url = self.endpoint("bot-status", tenant_id);
        debug!(%url, "Probing bridge status");

        let response = self.authorize(self.http_client.get(&url)).send().await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn request_pairing_code(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> RelayResult<String> {
        let url = self.endpoint("request-pairing-code", tenant_id);
        debug!(%url, "Requesting pairing code");

        let response = self
            .authorize(self.http_client.post(&url))
            .json(&PairingCodeRequest { phone_number })
            .send()
            .await?;
        let response = check_response(response).await?;
        let body: PairingCodeResponse = response.json().await?;
        Ok(body.pairing_code)
    }
}

/// Check HTTP response for errors.
async fn check_response(response: reqwest::Response) -> RelayResult<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!("Bridge request failed: {} - {}", status, body);
        return Err(RelayError::Bridge {
            status,
            message: body,
        });
    }
    Ok(response)
}

impl std::fmt::Debug for BridgeHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
