use std::fmt::Display;

use super::prompt::repair_instruction;
use crate::{Content, ModelBackend};
use tracing::{debug, info};

/// Upper bound on re-prompts, whatever the caller asks for.
pub const MAX_REPAIR_ATTEMPTS: usize = 1;

/// Output accepted by `process`, with the raw text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired<T> {
    pub value: T,
    pub raw: String,
    /// Number of model calls made, including the first.
    pub calls: usize,
}

#[derive(Debug)]
pub enum RepairError<E> {
    /// The model call itself failed.
    Model(anyhow::Error),
    /// The model answered, but the last answer was rejected by `process`.
    Output { error: E, raw: String, calls: usize },
}

/// Generate with the model and hand the raw text to `process`.
///
/// When `process` rejects the output and `repair_attempts` allows it, the
/// rejected answer and a correction request are appended to the
/// conversation and the model is asked again. `repair_attempts` is clamped
/// to [`MAX_REPAIR_ATTEMPTS`]; zero means a single call.
pub async fn generate_with_repair<T, E: Display>(
    backend: &dyn ModelBackend,
    label: &str,
    contents: Vec<Content>,
    repair_attempts: usize,
    mut process: impl FnMut(&str) -> Result<T, E>,
) -> Result<Repaired<T>, RepairError<E>> {
    let max_attempts = repair_attempts.min(MAX_REPAIR_ATTEMPTS);
    let mut contents = contents;
    let mut attempt = 0;

    loop {
        let raw = backend
            .generate(contents.clone())
            .await
            .map_err(RepairError::Model)?;

        debug!("{} raw output (attempt {}): {} chars", label, attempt, raw.len());

        match process(&raw) {
            Ok(value) => {
                return Ok(Repaired {
                    value,
                    raw,
                    calls: attempt + 1,
                });
            }
            Err(e) if attempt < max_attempts => {
                info!("Repair attempt {} for {} error: {}", attempt + 1, label, e);
                contents.push(Content::model(raw));
                contents.push(Content::user(repair_instruction(&e.to_string())));
                attempt += 1;
            }
            Err(error) => {
                return Err(RepairError::Output {
                    error,
                    raw,
                    calls: attempt + 1,
                });
            }
        }
    }
}
