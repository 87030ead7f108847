//! Append-only diagnostic logs persisted as a JSON array on disk.
//!
//! Nothing in the edit flow reads these back. Writes are best effort:
//! callers log failures and carry on.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Maximum number of characters of model output kept in `responseExcerpt`.
pub const RESPONSE_EXCERPT_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to access audit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audit log {path} is not a JSON array; refusing to overwrite it: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize audit log: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One AI edit attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub timestamp: String,
    pub workflow_id: String,
    pub user_request: String,
    pub response_excerpt: String,
    pub raw_output: String,
    pub success: bool,
}

impl AuditLogEntry {
    pub fn new(
        workflow_id: impl Into<String>,
        user_request: impl Into<String>,
        response: &str,
        raw_output: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            workflow_id: workflow_id.into(),
            user_request: user_request.into(),
            response_excerpt: truncate_chars(response, RESPONSE_EXCERPT_CHARS),
            raw_output: raw_output.into(),
            success,
        }
    }
}

/// One proxied create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyLogEntry {
    pub timestamp: String,
    pub request: Value,
    pub response: Value,
    pub status: u16,
}

impl ProxyLogEntry {
    pub fn new(request: Value, response: Value, status: u16) -> Self {
        Self {
            timestamp: now_rfc3339(),
            request,
            response,
            status,
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// First `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Destination for edit audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError>;
}

/// A JSON array file rewritten on every append.
///
/// Appends within one process are serialized; separate processes writing
/// the same file can still overwrite each other's entries. An existing
/// file that does not parse fails the append and is left untouched,
/// unless the log was built with [`JsonFileLog::start_fresh_on_error`].
pub struct JsonFileLog {
    path: PathBuf,
    start_fresh: bool,
    lock: Mutex<()>,
}

impl JsonFileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start_fresh: false,
            lock: Mutex::new(()),
        }
    }

    /// Treat an unreadable or unparseable file as empty and replace it.
    pub fn start_fresh_on_error(mut self) -> Self {
        self.start_fresh = true;
        self
    }

    /// Read-modify-write one entry onto the array. A missing file starts
    /// a fresh array.
    pub async fn append_json<T: Serialize + Sync>(&self, entry: &T) -> Result<(), AuditError> {
        let _guard = self.lock.lock().await;

        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(e) if self.start_fresh => {
                debug!("Starting {} afresh: {}", self.path.display(), e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        entries.push(serde_json::to_value(entry)?);

        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| AuditError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            "Appended entry {} to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Current contents of the log. A missing file reads as empty.
    pub async fn read_entries(&self) -> Result<Vec<Value>, AuditError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&data).map_err(|source| AuditError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl AuditSink for JsonFileLog {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        self.append_json(&entry).await
    }
}
