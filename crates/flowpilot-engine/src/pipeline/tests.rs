use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::test_stubs::{FailingAudit, MemoryStore, RecordingAudit, ScriptedModel};
use flowpilot_core::Node;
use flowpilot_store::{StoreClient, StoreConfig};
use serde_json::json;

// ── Test helpers ────────────────────────────────────────────────

/// A (disabled) -> B, the shape behind "remove disabled nodes".
fn workflow_with_disabled_node() -> Workflow {
    let mut workflow = Workflow::new("Flow");
    workflow.id = Some("wf-1".into());
    workflow.active = Some(true);
    let mut a = Node::new("A", "n8n-nodes-base.set");
    a.parameters.insert("disabled".into(), json!(true));
    workflow.add_node(a);
    workflow.add_node(Node::new("B", "n8n-nodes-base.noOp"));
    workflow.connect("A", "B");
    workflow
}

const CLEAN_OUTPUT: &str = r#"Sure, here it is:
```json
{"id": "wf-1", "active": true, "name": "Flow", "nodes": [{"name": "B", "type": "n8n-nodes-base.noOp", "parameters": {}}], "connections": {}}
```"#;

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_workflow("wf-1", workflow_with_disabled_node()))
}

fn pipeline(
    store: Arc<MemoryStore>,
    model: Arc<ScriptedModel>,
) -> (
    EditPipeline,
    tokio::sync::mpsc::UnboundedReceiver<AuditLogEntry>,
) {
    let (audit, rx) = RecordingAudit::new();
    let pipeline = EditPipeline::new(store, Some(model), Arc::new(audit));
    (pipeline, rx)
}

fn remove_disabled() -> EditRequest {
    EditRequest::new("wf-1", "remove disabled nodes")
}

async fn next_entry(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<AuditLogEntry>,
) -> AuditLogEntry {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("audit entry not written in time")
        .expect("audit channel closed")
}

// ── Success path ────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_disabled_nodes_updates_store() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model.clone());

    let outcome = pipeline.run(remove_disabled()).await.unwrap();

    assert_eq!(outcome.response, SUCCESS_MESSAGE);
    assert!(outcome.warnings.is_empty());
    assert_eq!(model.call_count(), 1);

    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    let body = &updates[0].body;
    assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(body["nodes"][0]["name"], "B");
    assert_eq!(body["connections"], json!({}));
    assert_eq!(body["settings"], json!({"executionOrder": "v1"}));
    assert!(body.get("id").is_none());
    assert!(body.get("active").is_none());
    assert_eq!(&outcome.updated_workflow, body);
}

#[tokio::test]
async fn test_prompt_contains_request_and_current_workflow() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store, model.clone());

    pipeline.run(remove_disabled()).await.unwrap();

    let calls = model.calls();
    let prompt = calls[0][0].text().unwrap();
    assert!(prompt.contains("User Request: remove disabled nodes"));
    assert!(prompt.contains("\"disabled\": true"));
    assert!(!prompt.contains("{{current_workflow}}"));
}

#[tokio::test]
async fn test_legacy_document_reaches_prompt_verbatim() {
    let legacy = json!({
        "id": 1,
        "name": "Legacy",
        "settings": null,
        "nodes": [
            {"name": "A", "type": "n8n-nodes-base.set", "parameters": {"disabled": true}},
            {"type": "n8n-nodes-base.noOp", "parameters": null}
        ],
        "connections": {}
    });
    let store = Arc::new(MemoryStore::new().with_document("wf-1", legacy.clone()));
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model.clone());

    pipeline.run(remove_disabled()).await.unwrap();

    let calls = model.calls();
    let prompt = calls[0][0].text().unwrap();
    let expected = serde_json::to_string_pretty(&legacy).unwrap();
    assert!(prompt.contains(&expected));
    assert!(prompt.contains("\"id\": 1"));
    assert!(prompt.contains("\"settings\": null"));
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn test_success_is_audited() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, mut rx) = pipeline(store, model);

    pipeline.run(remove_disabled()).await.unwrap();

    let entry = next_entry(&mut rx).await;
    assert!(entry.success);
    assert_eq!(entry.workflow_id, "wf-1");
    assert_eq!(entry.user_request, "remove disabled nodes");
    assert_eq!(entry.raw_output, CLEAN_OUTPUT);
    assert!(entry.response_excerpt.starts_with('{'));
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_run() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let pipeline = EditPipeline::new(store.clone(), Some(model), Arc::new(FailingAudit));

    let outcome = pipeline.run(remove_disabled()).await;

    assert!(outcome.is_ok());
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn test_dangling_edges_are_warned_not_blocked() {
    let store = store();
    let output = r#"{"name": "Flow", "nodes": [{"name": "B", "type": "x", "parameters": {}}], "connections": {"B": {"main": [[{"node": "Gone", "type": "main", "index": 0}]]}}}"#;
    let model = Arc::new(ScriptedModel::new(vec![output]));
    let (pipeline, _rx) = pipeline(store.clone(), model);

    let outcome = pipeline.run(remove_disabled()).await.unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("Gone"));
    assert_eq!(store.updates().len(), 1);
}

// ── Failure classification ──────────────────────────────────────

#[tokio::test]
async fn test_missing_model_is_config_error_before_store() {
    let store = store();
    let (audit, _rx) = RecordingAudit::new();
    let pipeline = EditPipeline::new(store.clone(), None, Arc::new(audit));

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ConfigError);
    assert_eq!(store.fetch_count(), 0);
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn test_blank_fields_are_invalid_request() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model.clone());

    let err = pipeline
        .run(EditRequest::new("wf-1", "   "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidRequest);

    let err = pipeline
        .run(EditRequest::new("", "remove disabled nodes"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidRequest);

    assert_eq!(store.fetch_count(), 0);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_unreachable_store_is_fetch_error_without_model_call() {
    let client = StoreClient::new(StoreConfig {
        base_url: Some("http://127.0.0.1:1/api/v1".into()),
        api_key: Some("key".into()),
        timeout: Some(Duration::from_secs(5)),
    })
    .unwrap();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (audit, _rx) = RecordingAudit::new();
    let pipeline = EditPipeline::new(Arc::new(client), Some(model.clone()), Arc::new(audit));

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::FetchError);
    assert_eq!(err.stage(), EditStage::Fetching);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_workflow_is_fetch_error() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store, model.clone());

    let err = pipeline
        .run(EditRequest::new("nope", "remove disabled nodes"))
        .await
        .unwrap_err();

    assert!(matches!(err, EditError::Fetch { status: Some(404), .. }));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_model_failure_is_model_error() {
    let store = store();
    let model = Arc::new(ScriptedModel::failing("quota exceeded"));
    let (pipeline, _rx) = pipeline(store.clone(), model);

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ModelError);
    assert!(err.to_string().contains("quota exceeded"));
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn test_prose_answer_is_no_json_found_and_never_updates() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec!["I cannot undo changes, sorry."]));
    let (pipeline, mut rx) = pipeline(store.clone(), model.clone());

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::NoJsonFound);
    assert_eq!(
        err.details(),
        Some(json!({"excerpt": "I cannot undo changes, sorry."}))
    );
    assert!(store.updates().is_empty());
    assert_eq!(model.call_count(), 1);

    let entry = next_entry(&mut rx).await;
    assert!(!entry.success);
    assert_eq!(entry.raw_output, "I cannot undo changes, sorry.");
}

#[tokio::test]
async fn test_truncated_answer_is_unbalanced() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![r#"{"name": "Flow", "nodes": ["#]));
    let (pipeline, _rx) = pipeline(store.clone(), model);

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UnbalancedJson);
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn test_malformed_object_is_parse_error() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec![r#"{"name": "Flow", nodes: []}"#]));
    let (pipeline, _rx) = pipeline(store.clone(), model);

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ParseError);
    let details = err.details().unwrap();
    assert_eq!(details["line"], 1);
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn test_store_rejection_body_is_passed_through() {
    let body = json!({"message": "request.body.nodes is not valid"});
    let store = Arc::new(
        MemoryStore::new()
            .with_workflow("wf-1", workflow_with_disabled_node())
            .rejecting_updates(400, body.clone()),
    );
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model);

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UpdateRejected);
    assert_eq!(err.details(), Some(body));
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn test_etag_is_sent_as_if_match() {
    let store = Arc::new(
        MemoryStore::new()
            .with_workflow("wf-1", workflow_with_disabled_node())
            .with_etag("wf-1", "\"v-3\""),
    );
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model);

    pipeline.run(remove_disabled()).await.unwrap();

    assert_eq!(store.updates()[0].if_match.as_deref(), Some("\"v-3\""));
}

#[tokio::test]
async fn test_precondition_failure_is_conflict() {
    let store = Arc::new(
        MemoryStore::new()
            .with_workflow("wf-1", workflow_with_disabled_node())
            .with_etag("wf-1", "\"v-3\"")
            .rejecting_updates(412, json!({"message": "version mismatch"})),
    );
    let model = Arc::new(ScriptedModel::new(vec![CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store, model);

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Conflict);
    assert_eq!(err.stage(), EditStage::Updating);
}

// ── Re-prompt ───────────────────────────────────────────────────

#[tokio::test]
async fn test_no_reprompt_by_default() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec!["not json", CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model.clone());

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::NoJsonFound);
    assert_eq!(model.call_count(), 1);
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn test_reprompt_recovers_when_enabled() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec!["not json", CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model.clone());
    let pipeline = pipeline.with_options(PipelineOptions {
        repair_attempts: 1,
        ..Default::default()
    });

    pipeline.run(remove_disabled()).await.unwrap();

    assert_eq!(model.call_count(), 2);
    let second = &model.calls()[1];
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].text().as_deref(), Some("not json"));
    assert_eq!(second[1].role.as_deref(), Some("model"));
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn test_reprompt_is_clamped_to_one_attempt() {
    let store = store();
    let model = Arc::new(ScriptedModel::new(vec!["nope", "still nope", CLEAN_OUTPUT]));
    let (pipeline, _rx) = pipeline(store.clone(), model.clone());
    let pipeline = pipeline.with_options(PipelineOptions {
        repair_attempts: 5,
        ..Default::default()
    });

    let err = pipeline.run(remove_disabled()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::NoJsonFound);
    assert_eq!(model.call_count(), 2);
    assert!(store.updates().is_empty());
}
