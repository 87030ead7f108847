use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use flowpilot_engine::{EditOutcome, EditRequest};

use super::json_body;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn edit_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<EditOutcome>, ApiError> {
    let request = json_body(body)?;
    let outcome = state.pipeline.run(request).await?;
    Ok(Json(outcome))
}
