use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::ETAG;
use axum::response::{IntoResponse, Response};
use flowpilot_core::audit::ProxyLogEntry;
use flowpilot_core::{CreateRequest, build_create_payload};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{json_body, passthrough_status};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SimpleCreate {
    pub name: String,
}

pub async fn list_workflows(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let listed = state.store.list_workflows().await.inspect_err(|e| {
        error!("Listing workflows failed: {}", e);
    })?;
    Ok((passthrough_status(listed.status), Json(listed.body)).into_response())
}

pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = build_create_payload(CreateRequest::Json(json_body(body)?))?;
    create(&state, payload).await
}

pub async fn create_simple_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SimpleCreate>, JsonRejection>,
) -> Result<Response, ApiError> {
    let SimpleCreate { name } = json_body(body)?;
    let payload = build_create_payload(CreateRequest::Simple { name })?;
    create(&state, payload).await
}

/// Forward a create call and record the exchange in the proxy log.
async fn create(state: &AppState, payload: Value) -> Result<Response, ApiError> {
    info!(
        "Creating workflow {}",
        payload.get("name").and_then(serde_json::Value::as_str).unwrap_or("<unnamed>")
    );
    let created = state.store.create_workflow(&payload).await.inspect_err(|e| {
        error!("Creating workflow failed: {}", e);
    })?;

    let entry = ProxyLogEntry::new(payload, created.body.clone(), created.status);
    if let Err(e) = state.proxy_log.append_json(&entry).await {
        warn!("Failed to write proxy log: {}", e);
    }

    Ok((passthrough_status(created.status), Json(created.body)).into_response())
}

pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let fetched = state.store.fetch_workflow(&id).await?;
    let mut response = (StatusCode::OK, Json(fetched.workflow)).into_response();
    if let Some(tag) = fetched.etag.and_then(|t| t.parse().ok()) {
        response.headers_mut().insert(ETAG, tag);
    }
    Ok(response)
}
