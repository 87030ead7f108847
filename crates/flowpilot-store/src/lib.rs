mod client;
mod error;

pub use client::*;
pub use error::*;

use async_trait::async_trait;
use flowpilot_core::WorkflowUpdate;
use serde_json::Value;

/// Header carrying the store API key.
pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Status and JSON body of a store response, passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    pub status: u16,
    pub body: Value,
}

/// A workflow read from the store, with its entity tag when one was sent.
///
/// The body is kept exactly as the store sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedWorkflow {
    pub workflow: Value,
    pub etag: Option<String>,
}

impl FetchedWorkflow {
    /// Length of the `nodes` array, or zero when there is none.
    pub fn node_count(&self) -> usize {
        self.workflow
            .get("nodes")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// Operations against the external workflow store.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn list_workflows(&self) -> Result<StoreResponse, StoreError>;

    async fn create_workflow(&self, payload: &Value) -> Result<StoreResponse, StoreError>;

    async fn fetch_workflow(&self, id: &str) -> Result<FetchedWorkflow, StoreError>;

    /// Replace a workflow. `if_match` is forwarded as an `If-Match` header.
    async fn update_workflow(
        &self,
        id: &str,
        update: &WorkflowUpdate,
        if_match: Option<&str>,
    ) -> Result<Value, StoreError>;
}
