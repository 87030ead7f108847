use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Keys an update payload may carry.
pub const UPDATE_FIELDS: &[&str] = &["name", "nodes", "connections", "settings", "staticData"];

/// Fields stripped from raw JSON before a create call.
const CREATE_STRIPPED_FIELDS: &[&str] = &["active", "id"];

const EXCERPT_RADIUS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse model output as JSON: {message} (line {line}, column {column}) near `{excerpt}`")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub excerpt: String,
}

/// Strict JSON parse of extracted model output.
pub fn parse_workflow(json_text: &str) -> Result<Value, ParseError> {
    serde_json::from_str(json_text).map_err(|e| ParseError {
        message: e.to_string(),
        line: e.line(),
        column: e.column(),
        excerpt: excerpt_at(json_text, e.line(), e.column()),
    })
}

/// Text surrounding a 1-based line/column position.
fn excerpt_at(text: &str, line: usize, column: usize) -> String {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let mut pos = (line_start + column.saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }

    let before: String = text[..pos]
        .chars()
        .rev()
        .take(EXCERPT_RADIUS)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let after: String = text[pos..].chars().take(EXCERPT_RADIUS).collect();
    format!("{before}{after}")
}

/// A workflow projected to the fields the store accepts on update.
///
/// Only [`sanitize_for_update`] builds one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkflowUpdate(Map<String, Value>);

impl WorkflowUpdate {
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// JavaScript truthiness, which is what the store's own clients use to
/// decide whether an optional field was "set".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn default_settings() -> Value {
    json!({ "executionOrder": "v1" })
}

/// Project a workflow object down to `name`, `nodes`, `connections`,
/// `settings` and, when truthy, `staticData`.
///
/// Never fails. Shapes are not checked; a malformed `nodes` value reaches
/// the store unchanged and is rejected there. A non-object input is
/// treated as an empty workflow.
pub fn sanitize_for_update(workflow: &Value) -> WorkflowUpdate {
    let empty = Map::new();
    let source = workflow.as_object().unwrap_or(&empty);
    let mut out = Map::new();

    for key in ["name", "nodes", "connections"] {
        if let Some(value) = source.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }

    let settings = source
        .get("settings")
        .filter(|v| is_truthy(v))
        .cloned()
        .unwrap_or_else(default_settings);
    out.insert("settings".to_string(), settings);

    if let Some(static_data) = source.get("staticData").filter(|v| is_truthy(v)) {
        out.insert("staticData".to_string(), static_data.clone());
    }

    WorkflowUpdate(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("Workflow name must not be empty")]
    EmptyName,

    #[error("Workflow JSON must be an object")]
    NotAnObject,
}

/// The two ways a new workflow can be described.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateRequest {
    /// Name only; everything else is an empty default workflow.
    Simple { name: String },
    /// A pasted workflow document.
    Json(Value),
}

/// Build the body of a create call. `active` and `id` never survive,
/// whichever form the caller used.
pub fn build_create_payload(request: CreateRequest) -> Result<Value, CreateError> {
    match request {
        CreateRequest::Simple { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(CreateError::EmptyName);
            }
            Ok(json!({
                "name": name,
                "nodes": [],
                "connections": {},
                "settings": { "saveManualExecutions": true, "callers": [] },
            }))
        }
        CreateRequest::Json(Value::Object(mut map)) => {
            for field in CREATE_STRIPPED_FIELDS {
                map.remove(*field);
            }
            Ok(Value::Object(map))
        }
        CreateRequest::Json(_) => Err(CreateError::NotAnObject),
    }
}
