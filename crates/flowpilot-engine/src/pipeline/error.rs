use flowpilot_core::{ExtractError, ParseError};
use flowpilot_store::StoreError;
use serde_json::{Value, json};
use thiserror::Error;

use super::{EditStage, FailureKind};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Invalid edit request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch workflow from store: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },

    #[error("Model call failed: {0}")]
    Model(String),

    #[error("No valid JSON in AI response")]
    NoJsonFound { raw_excerpt: String },

    #[error("AI response contained unbalanced or truncated JSON")]
    UnbalancedJson { excerpt: String },

    #[error("Failed to parse AI response")]
    Parse(#[source] ParseError),

    #[error("Failed to update workflow in store")]
    UpdateRejected { status: Option<u16>, body: Value },

    #[error("Workflow changed in the store during the edit")]
    Conflict { status: u16, body: Value },
}

impl EditError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::Config(_) => FailureKind::ConfigError,
            Self::Fetch { .. } => FailureKind::FetchError,
            Self::Model(_) => FailureKind::ModelError,
            Self::NoJsonFound { .. } => FailureKind::NoJsonFound,
            Self::UnbalancedJson { .. } => FailureKind::UnbalancedJson,
            Self::Parse(_) => FailureKind::ParseError,
            Self::UpdateRejected { .. } => FailureKind::UpdateRejected,
            Self::Conflict { .. } => FailureKind::Conflict,
        }
    }

    /// The stage that was running when the failure happened.
    pub fn stage(&self) -> EditStage {
        match self {
            Self::InvalidRequest(_) | Self::Config(_) => EditStage::Idle,
            Self::Fetch { .. } => EditStage::Fetching,
            Self::Model(_) => EditStage::Generating,
            Self::NoJsonFound { .. } | Self::UnbalancedJson { .. } => EditStage::Extracting,
            Self::Parse(_) => EditStage::Parsing,
            Self::UpdateRejected { .. } | Self::Conflict { .. } => EditStage::Updating,
        }
    }

    /// Diagnostic payload for callers, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidRequest(_) | Self::Config(_) | Self::Model(_) => None,
            Self::Fetch {
                status,
                message,
                body,
            } => Some(match body {
                Some(body) => json!({ "status": status, "body": body }),
                None => json!({ "status": status, "message": message }),
            }),
            Self::NoJsonFound { raw_excerpt } => Some(json!({ "excerpt": raw_excerpt })),
            Self::UnbalancedJson { excerpt } => Some(json!({ "excerpt": excerpt })),
            Self::Parse(e) => Some(json!({
                "message": e.message,
                "line": e.line,
                "column": e.column,
                "excerpt": e.excerpt,
            })),
            Self::UpdateRejected { body, .. } | Self::Conflict { body, .. } => Some(body.clone()),
        }
    }

    pub(crate) fn from_fetch(err: StoreError) -> Self {
        match err {
            StoreError::Config(message) => Self::Config(format!("workflow store {}", message)),
            other => Self::Fetch {
                status: other.status(),
                message: other.to_string(),
                body: other.body().cloned(),
            },
        }
    }

    pub(crate) fn from_update(err: StoreError) -> Self {
        match err {
            StoreError::Config(message) => Self::Config(format!("workflow store {}", message)),
            StoreError::Conflict { status, body } => Self::Conflict { status, body },
            StoreError::Rejected { status, body } | StoreError::Server { status, body } => {
                Self::UpdateRejected {
                    status: Some(status),
                    body,
                }
            }
            other => Self::UpdateRejected {
                status: other.status(),
                body: json!({ "message": other.to_string() }),
            },
        }
    }

    pub(crate) fn from_extract(err: ExtractError, raw_excerpt: String) -> Self {
        match err {
            ExtractError::NoJsonFound => Self::NoJsonFound { raw_excerpt },
            ExtractError::Unbalanced { excerpt } => Self::UnbalancedJson { excerpt },
        }
    }
}
