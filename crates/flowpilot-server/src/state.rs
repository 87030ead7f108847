use std::sync::Arc;

use anyhow::{Context, Result};
use flowpilot_core::audit::JsonFileLog;
use flowpilot_engine::{EditPipeline, PipelineOptions};
use flowpilot_llm::{LlmClient, ModelBackend};
use flowpilot_store::{StoreClient, WorkflowStore};
use tracing::{info, warn};

use crate::config::Config;

/// Shared by every request handler.
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
    pub pipeline: EditPipeline,
    /// Record of proxied create calls.
    pub proxy_log: JsonFileLog,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn WorkflowStore> = Arc::new(
            StoreClient::new(config.store_config()).context("Failed to build store client")?,
        );
        if !config.store_configured() {
            warn!("Workflow store URL or API key is not set; store routes will fail");
        }

        let model: Option<Arc<dyn ModelBackend>> = match config.llm_config() {
            Some(llm) => {
                info!("Model: {} at {}", llm.model, llm.base_url);
                Some(Arc::new(LlmClient::new(llm)?))
            }
            None => {
                warn!("Model API key is not set; edits will fail");
                None
            }
        };

        let audit = Arc::new(JsonFileLog::new(&config.edit_log));
        let pipeline = EditPipeline::new(Arc::clone(&store), model, audit).with_options(
            PipelineOptions {
                repair_attempts: config.repair_attempts,
                ..Default::default()
            },
        );

        Ok(Self {
            store,
            pipeline,
            proxy_log: JsonFileLog::new(&config.proxy_log).start_fresh_on_error(),
        })
    }
}
