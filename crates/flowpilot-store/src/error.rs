use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow store is not configured: {0}")]
    Config(String),

    #[error("Workflow {0} not found in store")]
    NotFound(String),

    #[error("Workflow store rejected the request ({status})")]
    Rejected { status: u16, body: Value },

    #[error("Workflow was changed in the store since it was read ({status})")]
    Conflict { status: u16, body: Value },

    #[error("Workflow store returned an error ({status})")]
    Server { status: u16, body: Value },

    #[error("Failed to reach workflow store: {0}")]
    Transport(#[from] reqwest::Error),
}

impl StoreError {
    /// Upstream HTTP status, when the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Rejected { status, .. }
            | Self::Conflict { status, .. }
            | Self::Server { status, .. } => Some(*status),
            Self::Config(_) | Self::Transport(_) => None,
        }
    }

    /// Upstream response body, when there was one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Rejected { body, .. } | Self::Conflict { body, .. } | Self::Server { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Classify a non-success update response.
    pub fn from_status(status: u16, body: Value) -> Self {
        match status {
            409 | 412 => Self::Conflict { status, body },
            400..=499 => Self::Rejected { status, body },
            _ => Self::Server { status, body },
        }
    }
}
