mod client;
pub mod editor;
mod types;

pub use client::*;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// A text-generation model. Takes a conversation and returns the text
/// of the first candidate.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, contents: Vec<Content>) -> Result<String>;
}
