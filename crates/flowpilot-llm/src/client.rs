use std::time::Duration;

use crate::ModelBackend;
use crate::types::*;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_output_tokens: None,
            timeout: None,
        }
    }
}

/// Client for the `generateContent` endpoint.
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build LLM HTTP client")?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    pub async fn generate_content(
        &self,
        contents: Vec<Content>,
    ) -> Result<GenerateContentResponse> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Model API key is not configured"))?;
        let url = self.endpoint();

        let generation_config =
            if self.config.temperature.is_some() || self.config.max_output_tokens.is_some() {
                Some(GenerationConfig {
                    temperature: self.config.temperature,
                    max_output_tokens: self.config.max_output_tokens,
                })
            } else {
                None
            };

        let request = GenerateContentRequest {
            contents,
            generation_config,
        };

        debug!("LLM request to {}: {} turns", url, request.contents.len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to LLM")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM request failed ({}): {}", status, error_text);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        info!(
            "LLM response: finish_reason={:?}, total_tokens={:?}",
            body.candidates
                .first()
                .and_then(|c| c.finish_reason.as_ref()),
            body.usage_metadata
                .as_ref()
                .and_then(|u| u.total_token_count)
        );

        Ok(body)
    }
}

/// Text of the first candidate, or a descriptive error when the model
/// returned nothing usable.
pub fn first_candidate_text(response: &GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        anyhow::bail!("Prompt was blocked by the model: {}", reason);
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| anyhow!("Model returned no candidates"))?;

    candidate
        .content
        .as_ref()
        .and_then(Content::text)
        .ok_or_else(|| {
            anyhow!(
                "Model returned no text content (finish_reason={:?})",
                candidate.finish_reason
            )
        })
}

#[async_trait]
impl ModelBackend for LlmClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, contents: Vec<Content>) -> Result<String> {
        let response = self.generate_content(contents).await?;
        first_candidate_text(&response)
    }
}
