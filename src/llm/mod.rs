//! Abstractions for text generation via local providers.
//!
//! The summarization and QA layers issue completion requests through the
//! [`CompletionClient`] trait. The Ollama-backed client mirrors the embedding adapter by
//! talking HTTP directly to the runtime, and [`complete_with_backoff`] wraps any client
//! with retry-on-rate-limit semantics.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Attempts made against a rate-limited provider before giving up.
pub const RATE_LIMIT_ATTEMPTS: u32 = 3;

const BACKOFF_BASE_MS: u64 = 500;

/// Errors surfaced while attempting text generation.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider was unreachable or explicitly disabled.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider rejected the request due to rate limiting.
    #[error("Completion provider rate limited the request")]
    RateLimited,
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fully qualified model identifier understood by the provider.
    pub model: String,
    /// Optional system instruction framing the task.
    pub system: Option<String>,
    /// Prompt assembled by the calling layer.
    pub prompt: String,
}

/// Interface implemented by text generation providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Issue a completion, retrying with exponential backoff when the provider rate limits.
///
/// Only [`CompletionError::RateLimited`] triggers a retry; every other error propagates
/// immediately. After [`RATE_LIMIT_ATTEMPTS`] rate-limited attempts the last error is
/// returned to the caller.
pub async fn complete_with_backoff(
    client: &dyn CompletionClient,
    request: CompletionRequest,
) -> Result<String, CompletionError> {
    let mut delay = Duration::from_millis(BACKOFF_BASE_MS);
    for attempt in 1..=RATE_LIMIT_ATTEMPTS {
        match client.complete(request.clone()).await {
            Err(CompletionError::RateLimited) if attempt < RATE_LIMIT_ATTEMPTS => {
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Provider rate limited, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            other => return other,
        }
    }
    Err(CompletionError::RateLimited)
}

/// Ollama-backed completion client using the `/api/generate` endpoint.
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
}

impl OllamaCompletionClient {
    /// Create a client against the given Ollama base URL.
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .user_agent("filing-digest/llm")
            .build()
            .expect("Failed to construct reqwest::Client for completions");
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let mut payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": 0.1,
            }
        });
        if let Some(system) = &request.system {
            payload["system"] = json!(system);
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(CompletionError::ProviderUnavailable(format!(
                    "Ollama endpoint {} returned 404",
                    self.endpoint()
                )));
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(CompletionError::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(CompletionError::GenerationFailed(format!(
                    "Ollama returned {status}: {body}"
                )));
            }
            _ => {}
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(CompletionError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
