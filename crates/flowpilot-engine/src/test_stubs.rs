//! In-memory doubles for the pipeline's collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flowpilot_core::audit::{AuditError, AuditLogEntry, AuditSink};
use flowpilot_core::{Workflow, WorkflowUpdate};
use flowpilot_llm::{Content, ModelBackend};
use flowpilot_store::{FetchedWorkflow, StoreError, StoreResponse, WorkflowStore};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// Model that replays canned answers in order and records every call.
pub struct ScriptedModel {
    responses: Mutex<Vec<anyhow::Result<String>>>,
    calls: Mutex<Vec<Vec<Content>>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A model whose single call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            responses: Mutex::new(vec![Err(anyhow::anyhow!(message.to_string()))]),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<Content>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, contents: Vec<Content>) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(contents);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            anyhow::bail!("ScriptedModel has no responses left");
        }
        responses.remove(0)
    }
}

/// A recorded `update_workflow` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub id: String,
    pub body: Value,
    pub if_match: Option<String>,
}

/// Store backed by a map, with switches for the failure modes the
/// pipeline distinguishes.
#[derive(Default)]
pub struct MemoryStore {
    workflows: Mutex<HashMap<String, Value>>,
    etags: Mutex<HashMap<String, String>>,
    update_failure: Mutex<Option<(u16, Value)>>,
    updates: Mutex<Vec<RecordedUpdate>>,
    created: Mutex<Vec<Value>>,
    fetch_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(self, id: &str, workflow: Workflow) -> Self {
        let document = serde_json::to_value(&workflow).unwrap_or_default();
        self.with_document(id, document)
    }

    /// Store a workflow document exactly as given.
    pub fn with_document(self, id: &str, document: Value) -> Self {
        self.workflows
            .lock()
            .unwrap()
            .insert(id.to_string(), document);
        self
    }

    pub fn with_etag(self, id: &str, etag: &str) -> Self {
        self.etags
            .lock()
            .unwrap()
            .insert(id.to_string(), etag.to_string());
        self
    }

    /// Every update answers with this status and body.
    pub fn rejecting_updates(self, status: u16, body: Value) -> Self {
        *self.update_failure.lock().unwrap() = Some((status, body));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<Value> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn list_workflows(&self) -> Result<StoreResponse, StoreError> {
        let workflows = self.workflows.lock().unwrap();
        let mut data: Vec<Value> = workflows
            .iter()
            .map(|(id, wf)| json!({ "id": id, "name": wf["name"] }))
            .collect();
        data.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
        Ok(StoreResponse {
            status: 200,
            body: json!({ "data": data }),
        })
    }

    async fn create_workflow(&self, payload: &Value) -> Result<StoreResponse, StoreError> {
        self.created.lock().unwrap().push(payload.clone());
        let id = format!("created-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut body = payload.clone();
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), json!(id));
            map.insert("active".to_string(), json!(false));
        }
        Ok(StoreResponse { status: 200, body })
    }

    async fn fetch_workflow(&self, id: &str) -> Result<FetchedWorkflow, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let workflow = self
            .workflows
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let etag = self.etags.lock().unwrap().get(id).cloned();
        Ok(FetchedWorkflow { workflow, etag })
    }

    async fn update_workflow(
        &self,
        id: &str,
        update: &WorkflowUpdate,
        if_match: Option<&str>,
    ) -> Result<Value, StoreError> {
        self.updates.lock().unwrap().push(RecordedUpdate {
            id: id.to_string(),
            body: update.to_value(),
            if_match: if_match.map(String::from),
        });
        if let Some((status, body)) = self.update_failure.lock().unwrap().clone() {
            return Err(StoreError::from_status(status, body));
        }
        if let (Some(expected), Some(sent)) = (self.etags.lock().unwrap().get(id), if_match)
            && expected != sent
        {
            return Err(StoreError::Conflict {
                status: 412,
                body: json!({ "message": "version mismatch" }),
            });
        }

        self.workflows
            .lock()
            .unwrap()
            .insert(id.to_string(), update.to_value());

        let mut body = update.to_value();
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), json!(id));
        }
        Ok(body)
    }
}

/// Audit sink that forwards entries to a channel so tests can await them.
pub struct RecordingAudit {
    tx: mpsc::UnboundedSender<AuditLogEntry>,
}

impl RecordingAudit {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditLogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let _ = self.tx.send(entry);
        Ok(())
    }
}

/// Audit sink whose every append fails.
pub struct FailingAudit;

#[async_trait]
impl AuditSink for FailingAudit {
    async fn append(&self, _entry: AuditLogEntry) -> Result<(), AuditError> {
        Err(AuditError::Io {
            path: "unwritable.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}
