//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use flowpilot_llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, LlmConfig};
use flowpilot_store::StoreConfig;

/// Proxy and AI editor for an n8n-compatible workflow server.
///
/// Credentials are optional at startup. Requests that need a missing one
/// fail with a configuration error instead of the process refusing to run.
#[derive(Debug, Clone, Parser)]
#[command(name = "flowpilot", version, about)]
pub struct Config {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the workflow store's REST API, e.g. `http://localhost:5678/api/v1`.
    #[arg(long, env = "N8N_API_URL")]
    pub store_url: Option<String>,

    #[arg(long, env = "N8N_API_KEY", hide_env_values = true)]
    pub store_api_key: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub model_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub model_base_url: String,

    /// Where edit audit entries are appended.
    #[arg(long, env = "AI_EDIT_LOG", default_value = "ai_edit_logs.json")]
    pub edit_log: PathBuf,

    /// Where proxied create calls are appended.
    #[arg(long, env = "API_RESPONSE_LOG", default_value = "api_responses.json")]
    pub proxy_log: PathBuf,

    /// Directory for the rolling trace files.
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Re-prompts after unusable model output (0 or 1).
    #[arg(long, env = "REPAIR_ATTEMPTS", default_value_t = 0)]
    pub repair_attempts: usize,

    /// Transport timeout for store and model calls. Unset means none.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: Option<u64>,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }

    /// Whether both store settings hold something other than whitespace.
    pub fn store_configured(&self) -> bool {
        [&self.store_url, &self.store_api_key]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            base_url: self.store_url.clone(),
            api_key: self.store_api_key.clone(),
            timeout: self.upstream_timeout(),
        }
    }

    /// `None` when no model key is set.
    pub fn llm_config(&self) -> Option<LlmConfig> {
        let api_key = self.model_api_key.clone().filter(|k| !k.trim().is_empty())?;
        Some(LlmConfig {
            base_url: self.model_base_url.clone(),
            api_key: Some(api_key),
            model: self.model.clone(),
            timeout: self.upstream_timeout(),
            ..LlmConfig::default()
        })
    }
}
