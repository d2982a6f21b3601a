//! The external text-generation service.
//!
//! The core only depends on the [`Oracle`] trait. [`OllamaOracle`] talks to
//! a local Ollama server over HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::memory::ConversationTurn;

/// Errors from an oracle call. Surfaced to the caller unchanged.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// Generates a reply for an assembled prompt.
pub trait Oracle: Send + Sync {
    /// `prompt` already contains the rendered `context`; implementations
    /// that accept structured history may use `context` directly.
    fn generate(
        &self,
        prompt: &str,
        context: &[ConversationTurn],
        model: &str,
    ) -> Result<String, OracleError>;
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

impl<'a> GenerateRequest<'a> {
    fn new(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.7,
                top_p: 0.9,
                top_k: 40,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's `/api/generate`, non-streaming.
pub struct OllamaOracle {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    runtime: tokio::runtime::Runtime,
}

impl OllamaOracle {
    /// `base_url` is the server root, e.g. `http://localhost:11434`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sarek/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            timeout,
            runtime,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &GenerateRequest<'_>) -> Result<String, OracleError> {
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(OracleError::Unavailable(format!(
                "model '{}' not found",
                request.model
            )));
        }
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }

    fn classify(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else if err.is_decode() {
            OracleError::InvalidResponse(err.to_string())
        } else {
            OracleError::Unavailable(err.to_string())
        }
    }
}

impl Oracle for OllamaOracle {
    fn generate(
        &self,
        prompt: &str,
        _context: &[ConversationTurn],
        model: &str,
    ) -> Result<String, OracleError> {
        let request = GenerateRequest::new(model, prompt);
        debug!(model, endpoint = %self.endpoint, chars = prompt.len(), "querying oracle");

        let result = self.runtime.block_on(self.post(&request));
        if let Err(err) = &result {
            warn!(model, error = %err, "oracle request failed");
        }
        result
    }
}
