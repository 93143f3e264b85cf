//! Client side of the scan engine service.
//!
//! The engine is a ZMap wrapper exposing a small JSON API. [`ScanEngine`] is
//! the seam the orchestrator talks to; [`HttpEngine`] is the production
//! implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ConsoleError, Result};

/// Parameters sent to `POST /scan-sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    pub subnets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocklist_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowlist_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    pub probe_module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<u8>,
    pub return_results: bool,
}

/// Body of a scan response. Every field is optional; which ones are present
/// depends on the engine version and on whether the scan succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ips_found: Option<Vec<Value>>,
    #[serde(default)]
    pub results: Option<Vec<Value>>,
    #[serde(default)]
    pub total_hosts_scanned: Option<u64>,
    #[serde(default)]
    pub output_file: Option<String>,
}

/// A response that passed the failure checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutcome {
    pub hosts: Vec<Value>,
    pub total_hosts_scanned: Option<u64>,
    pub output_file: Option<String>,
}

impl EngineResponse {
    /// Turn an explicit `error` field or a `failed` status into
    /// [`ConsoleError::EngineReportedFailure`].
    pub fn into_outcome(self) -> Result<EngineOutcome> {
        let error = self.error.filter(|e| !e.trim().is_empty());
        if let Some(error) = error {
            return Err(ConsoleError::EngineReportedFailure(error));
        }
        if self.status.as_deref() == Some("failed") {
            return Err(ConsoleError::EngineReportedFailure(
                "scan failed with status: failed".to_string(),
            ));
        }
        Ok(EngineOutcome {
            hosts: self.ips_found.or(self.results).unwrap_or_default(),
            total_hosts_scanned: self.total_hosts_scanned,
            output_file: self.output_file.filter(|f| !f.is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistRequest {
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub output_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistFile {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Run a scan and wait for the engine's answer.
    async fn scan(&self, request: &EngineRequest) -> Result<EngineResponse>;

    /// Probe modules the engine supports, as the engine reports them.
    async fn probe_modules(&self) -> Result<Value>;

    /// Engine banner, used as a connectivity check.
    async fn health(&self) -> Result<Value>;

    async fn create_blocklist(&self, request: &BlocklistRequest) -> Result<BlocklistFile>;

    async fn create_standard_blocklist(&self) -> Result<BlocklistFile>;
}

/// [`ScanEngine`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEngine {
    /// `timeout` bounds a whole request, including a synchronous scan.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(path, "engine GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!(path, "engine POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }
}

fn unreachable(e: reqwest::Error) -> ConsoleError {
    if e.is_timeout() {
        ConsoleError::EngineUnreachable(format!("request timed out: {e}"))
    } else {
        ConsoleError::EngineUnreachable(e.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Non-2xx answers become [`ConsoleError::EngineReportedFailure`], carrying
/// the body's `error` field when there is one.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(unreachable)?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|b| b.error)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| format!("scan engine returned HTTP {status}"));
        return Err(ConsoleError::EngineReportedFailure(message));
    }
    serde_json::from_slice(&bytes).map_err(|e| ConsoleError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl ScanEngine for HttpEngine {
    async fn scan(&self, request: &EngineRequest) -> Result<EngineResponse> {
        let body: Option<EngineResponse> = self.post_json("/scan-sync", request).await?;
        body.ok_or_else(|| {
            ConsoleError::MalformedResponse("empty response from scan service".to_string())
        })
    }

    async fn probe_modules(&self) -> Result<Value> {
        self.get_json("/probe-modules").await
    }

    async fn health(&self) -> Result<Value> {
        self.get_json("/").await
    }

    async fn create_blocklist(&self, request: &BlocklistRequest) -> Result<BlocklistFile> {
        self.post_json("/blocklist", request).await
    }

    async fn create_standard_blocklist(&self) -> Result<BlocklistFile> {
        self.post_json("/standard-blocklist", &serde_json::json!({})).await
    }
}
