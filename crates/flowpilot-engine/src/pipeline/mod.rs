//! The AI edit flow: fetch a workflow, ask the model to rewrite it, and
//! write the sanitized result back to the store.
//!
//! Every external call is made once unless a re-prompt is explicitly
//! enabled through [`PipelineOptions::repair_attempts`]. The first failing
//! stage ends the run with an [`EditError`].

mod error;
mod stage;

#[cfg(test)]
mod tests;

pub use error::EditError;
pub use stage::{EditStage, FailureKind};

use std::fmt;
use std::sync::Arc;

use flowpilot_core::audit::{AuditLogEntry, AuditSink, truncate_chars};
use flowpilot_core::{
    ExtractError, ParseError, Workflow, check_connections, extract_json_object, parse_workflow,
    sanitize_for_update,
};
use flowpilot_llm::editor::{EDITOR_PROMPT, RepairError, build_editor_prompt, generate_with_repair};
use flowpilot_llm::{Content, ModelBackend};
use flowpilot_store::WorkflowStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub const SUCCESS_MESSAGE: &str =
    "Workflow updated successfully! The changes are now live in the editor.";

/// Characters of raw model output kept in `NoJsonFound` diagnostics.
const RAW_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub workflow_id: String,
    pub user_request: String,
}

impl EditRequest {
    pub fn new(workflow_id: impl Into<String>, user_request: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            user_request: user_request.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub response: String,
    /// The sanitized payload the store accepted.
    pub updated_workflow: Value,
    /// Connection inconsistencies spotted in the payload. Never enforced.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Re-prompts allowed after unusable model output. Clamped to one.
    pub repair_attempts: usize,
    /// Instruction template with `{{user_request}}` and `{{current_workflow}}`.
    pub template: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            repair_attempts: 0,
            template: EDITOR_PROMPT.to_string(),
        }
    }
}

/// Why the model's answer could not be used.
#[derive(Debug)]
enum OutputError {
    Extract(ExtractError),
    Parse(ParseError),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract(e) => e.fmt(f),
            Self::Parse(e) => e.fmt(f),
        }
    }
}

/// Extract then parse; shared by the first attempt and any re-prompt.
fn read_model_output(raw: &str) -> Result<(String, Value), OutputError> {
    debug!("stage={}", EditStage::Extracting);
    let json_text = extract_json_object(raw).map_err(OutputError::Extract)?;
    debug!("stage={} ({} chars)", EditStage::Parsing, json_text.len());
    let value = parse_workflow(&json_text).map_err(OutputError::Parse)?;
    Ok((json_text, value))
}

pub struct EditPipeline {
    store: Arc<dyn WorkflowStore>,
    model: Option<Arc<dyn ModelBackend>>,
    audit: Arc<dyn AuditSink>,
    options: PipelineOptions,
}

impl EditPipeline {
    /// `model` is `None` when no model credential is configured; runs then
    /// fail with a configuration error before touching the store.
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        model: Option<Arc<dyn ModelBackend>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            model,
            audit,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(&self, request: EditRequest) -> Result<EditOutcome, EditError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("edit", %run_id, workflow_id = %request.workflow_id);
        async {
            let result = self.run_stages(&request).await;
            match &result {
                Ok(outcome) => info!(
                    "stage={} warnings={}",
                    EditStage::Done,
                    outcome.warnings.len()
                ),
                Err(e) => warn!(
                    "Edit failed: stage={} kind={:?} error={}",
                    e.stage(),
                    e.kind(),
                    e
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, request: &EditRequest) -> Result<EditOutcome, EditError> {
        if request.workflow_id.trim().is_empty() {
            return Err(EditError::InvalidRequest("workflowId is required".into()));
        }
        if request.user_request.trim().is_empty() {
            return Err(EditError::InvalidRequest("userRequest is required".into()));
        }

        let model = self
            .model
            .as_deref()
            .ok_or_else(|| EditError::Config("model API key is not configured".into()))?;

        info!("stage={}", EditStage::Fetching);
        let fetched = self
            .store
            .fetch_workflow(&request.workflow_id)
            .await
            .map_err(EditError::from_fetch)?;
        info!(
            "Current workflow has {} nodes (etag={:?})",
            fetched.node_count(),
            fetched.etag
        );

        info!("stage={}", EditStage::Prompting);
        let prompt = build_editor_prompt(
            &self.options.template,
            &request.user_request,
            &fetched.workflow,
        );
        debug!("Prompt length: {} chars", prompt.len());

        info!("stage={} model={}", EditStage::Generating, model.model_name());
        let generated = generate_with_repair(
            model,
            "Editor",
            vec![Content::user(prompt)],
            self.options.repair_attempts,
            read_model_output,
        )
        .await;

        let (json_text, parsed) = match generated {
            Ok(repaired) => {
                let (json_text, parsed) = repaired.value;
                self.record(AuditLogEntry::new(
                    &request.workflow_id,
                    &request.user_request,
                    &json_text,
                    repaired.raw,
                    true,
                ));
                (json_text, parsed)
            }
            Err(RepairError::Model(e)) => return Err(EditError::Model(format!("{:#}", e))),
            Err(RepairError::Output { error, raw, calls }) => {
                warn!("Unusable model output after {} call(s): {}", calls, error);
                self.record(AuditLogEntry::new(
                    &request.workflow_id,
                    &request.user_request,
                    &raw,
                    raw.clone(),
                    false,
                ));
                return Err(match error {
                    OutputError::Extract(e) => {
                        EditError::from_extract(e, truncate_chars(&raw, RAW_EXCERPT_CHARS))
                    }
                    OutputError::Parse(e) => EditError::Parse(e),
                });
            }
        };
        debug!("Parsed model output: {} chars", json_text.len());

        info!("stage={}", EditStage::Sanitizing);
        let update = sanitize_for_update(&parsed);
        let warnings = connection_warnings(&update.to_value());
        for warning in &warnings {
            warn!("{}", warning);
        }

        info!("stage={}", EditStage::Updating);
        let stored = self
            .store
            .update_workflow(&request.workflow_id, &update, fetched.etag.as_deref())
            .await
            .map_err(EditError::from_update)?;
        debug!("Store accepted update: {}", stored);

        Ok(EditOutcome {
            response: SUCCESS_MESSAGE.to_string(),
            updated_workflow: update.into_value(),
            warnings,
        })
    }

    /// Hand an entry to the audit sink without waiting for it.
    fn record(&self, entry: AuditLogEntry) {
        let sink = Arc::clone(&self.audit);
        tokio::spawn(
            async move {
                if let Err(e) = sink.append(entry).await {
                    warn!("Failed to write audit log: {}", e);
                }
            }
            .in_current_span(),
        );
    }
}

/// Dangling edges and similar issues in a sanitized payload, as messages.
fn connection_warnings(update: &Value) -> Vec<String> {
    match serde_json::from_value::<Workflow>(update.clone()) {
        Ok(workflow) => check_connections(&workflow)
            .iter()
            .map(ToString::to_string)
            .collect(),
        Err(e) => vec![format!("Could not check connections: {}", e)],
    }
}
