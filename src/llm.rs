//! Text completion service
//!
//! Every model call in the pipeline (classification, extraction, query
//! rewriting, reply synthesis) goes through [`Completion`], so tests can swap
//! in a scripted model.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Sampling options for one completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub stop: Vec<String>,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Deterministic sampling with no stop sequences
    #[must_use]
    pub fn deterministic() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A text completion oracle
#[async_trait]
pub trait Completion: Send + Sync {
    /// Complete `prompt` and return the raw generated text
    ///
    /// # Errors
    ///
    /// Returns error if the model is unreachable, times out or answers garbage
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

/// Ollama `/api/generate` client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "no_stops")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

fn no_stops(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    /// Create a client for the given generate endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Hearth-Gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(&config.endpoint, &config.model, config.timeout)
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Completion for OllamaClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
                stop: &options.stop,
                num_predict: options.max_tokens,
            },
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "llm request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("status {status}: {body}")));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("malformed response: {e}")))?;

        tracing::debug!(response = %generated.response, "llm response");
        Ok(generated.response.trim().to_string())
    }
}
