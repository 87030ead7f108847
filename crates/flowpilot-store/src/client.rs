use std::time::Duration;

use crate::{API_KEY_HEADER, FetchedWorkflow, StoreError, StoreResponse, WorkflowStore};
use async_trait::async_trait;
use flowpilot_core::WorkflowUpdate;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Method, RequestBuilder, Url};
use serde_json::{Value, json};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Base URL of the store's REST API, e.g. `http://localhost:5678/api/v1`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

/// reqwest-backed [`WorkflowStore`].
pub struct StoreClient {
    config: StoreConfig,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            config,
            http: builder.build()?,
        })
    }

    /// Resolve `/workflows[/id]` against the base URL, checking that both
    /// required settings are present before anything touches the network.
    fn request(&self, method: Method, id: Option<&str>) -> Result<RequestBuilder, StoreError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StoreError::Config("base URL is missing".to_string()))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StoreError::Config("API key is missing".to_string()))?;

        let mut url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::Config(format!("base URL '{}' cannot carry a path", base_url))
            })?;
            segments.pop_if_empty().push("workflows");
            if let Some(id) = id {
                segments.push(id);
            }
        }

        debug!("Store request: {} {}", method, url);
        Ok(self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, api_key))
    }
}

/// Read a response body as JSON. Bodies that are not JSON are wrapped so
/// callers always get a JSON value back.
async fn read_json(response: reqwest::Response) -> Result<(u16, Value), StoreError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or_else(|_| {
            json!({
                "error": "Invalid JSON response from workflow store",
                "text": text,
            })
        })
    };
    Ok((status, body))
}

#[async_trait]
impl WorkflowStore for StoreClient {
    async fn list_workflows(&self) -> Result<StoreResponse, StoreError> {
        let response = self.request(Method::GET, None)?.send().await?;
        let (status, body) = read_json(response).await?;
        info!("Listed workflows: status={}", status);
        Ok(StoreResponse { status, body })
    }

    async fn create_workflow(&self, payload: &Value) -> Result<StoreResponse, StoreError> {
        let response = self
            .request(Method::POST, None)?
            .json(payload)
            .send()
            .await?;
        let (status, body) = read_json(response).await?;
        info!("Created workflow: status={}", status);
        Ok(StoreResponse { status, body })
    }

    async fn fetch_workflow(&self, id: &str) -> Result<FetchedWorkflow, StoreError> {
        let response = self.request(Method::GET, Some(id))?.send().await?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let (status, body) = read_json(response).await?;

        if status == 404 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !(200..300).contains(&status) {
            error!("Fetching workflow {} failed: status={} body={}", id, status, body);
            return Err(StoreError::Server { status, body });
        }

        let fetched = FetchedWorkflow {
            workflow: body,
            etag,
        };
        debug!(
            "Fetched workflow {}: {} nodes, etag={:?}",
            id,
            fetched.node_count(),
            fetched.etag
        );
        Ok(fetched)
    }

    async fn update_workflow(
        &self,
        id: &str,
        update: &WorkflowUpdate,
        if_match: Option<&str>,
    ) -> Result<Value, StoreError> {
        let mut request = self.request(Method::PUT, Some(id))?.json(update);
        if let Some(tag) = if_match {
            request = request.header(IF_MATCH, tag);
        }

        let response = request.send().await?;
        let (status, body) = read_json(response).await?;

        if !(200..300).contains(&status) {
            error!("Updating workflow {} failed: status={} body={}", id, status, body);
            return Err(StoreError::from_status(status, body));
        }

        info!("Updated workflow {}", id);
        Ok(body)
    }
}
