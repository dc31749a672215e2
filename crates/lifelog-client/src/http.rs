use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use lifelog_core::api::LifelogApi;
use lifelog_core::auth::ApiKey;
use lifelog_core::errors::UpstreamError;
use lifelog_core::lifelog::{ByIdResponse, Lifelog, LifelogPage, LifelogQuery, ListResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.lifelog.ai/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Synchronous request/response wrapper around the upstream lifelog API.
/// Stateless besides the held credential; one instance per authenticated
/// session.
pub struct LifelogClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl LifelogClient {
    pub fn new(api_key: ApiKey) -> Result<Self, UpstreamError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: ApiKey,
        base_url: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::NetworkError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "upstream GET");
        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", self.api_key.0.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| UpstreamError::NetworkError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }

        resp.json::<T>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LifelogApi for LifelogClient {
    async fn get_lifelogs(&self, query: &LifelogQuery) -> Result<LifelogPage, UpstreamError> {
        let pairs = query.to_query_pairs();
        let resp: ListResponse = self.get_json("/lifelogs", &pairs).await?;
        Ok(resp.into_page())
    }

    async fn get_lifelog_by_id(&self, id: &str) -> Result<Lifelog, UpstreamError> {
        let resp: ByIdResponse = self.get_json(&format!("/lifelogs/{id}"), &[]).await?;
        Ok(resp.into_lifelog())
    }

    async fn delete_lifelog(&self, id: &str) -> Result<(), UpstreamError> {
        let url = format!("{}/lifelogs/{id}", self.base_url);
        tracing::debug!(url = %url, "upstream DELETE");
        let resp = self
            .client
            .delete(&url)
            .header("X-API-Key", self.api_key.0.expose_secret())
            .send()
            .await
            .map_err(|e| UpstreamError::NetworkError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }
        Ok(())
    }
}
