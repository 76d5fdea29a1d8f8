//! HTTP client for the dividends endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Dividend, DividendId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid sync configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Dividends HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Dividends API error: {0}")]
    Api(String),
    #[error("Sync worker is no longer running")]
    WorkerStopped,
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Remote side of the client cache
#[async_trait]
pub trait DividendsRemote: Send + Sync {
    /// Fetch every dividend owned by `user_id`
    async fn load(&self, user_id: &str) -> SyncResult<Vec<Dividend>>;

    /// Upsert `records` on the server
    async fn save(&self, records: &[Dividend]) -> SyncResult<()>;

    /// Delete one dividend owned by `user_id`, returning how many were removed
    async fn delete(&self, user_id: &str, id: DividendId) -> SyncResult<usize>;
}

#[derive(Clone)]
pub struct DividendsApiClient {
    endpoint: String,
    client: reqwest::Client,
}

impl DividendsApiClient {
    /// `endpoint` is the full collection URL, e.g.
    /// `http://127.0.0.1:8080/api/dividends`
    pub fn new(endpoint: impl Into<String>) -> SyncResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::builder().build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    deleted: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl DividendsRemote for DividendsApiClient {
    async fn load(&self, user_id: &str) -> SyncResult<Vec<Dividend>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("userId", user_id)])
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<Vec<Dividend>>().await?)
    }

    async fn save(&self, records: &[Dividend]) -> SyncResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(records)
            .send()
            .await?;

        let payload = ensure_success(response)
            .await?
            .json::<WriteResponse>()
            .await?;
        if payload.success {
            Ok(())
        } else {
            Err(SyncError::Api(
                payload
                    .error
                    .unwrap_or_else(|| "Failed to save dividends".to_string()),
            ))
        }
    }

    async fn delete(&self, user_id: &str, id: DividendId) -> SyncResult<usize> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.endpoint))
            .query(&[("userId", user_id)])
            .send()
            .await?;

        let payload = ensure_success(response)
            .await?
            .json::<WriteResponse>()
            .await?;
        if payload.success {
            Ok(payload.deleted.unwrap_or_default())
        } else {
            Err(SyncError::Api(
                payload
                    .error
                    .unwrap_or_else(|| format!("Failed to delete dividend {id}")),
            ))
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> SyncResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Api(parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> SyncResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        SyncError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(SyncError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
