//! Text-completion provider abstraction and implementations.
//!
//! Defines the [`CompletionProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when no model is configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI chat completions API with retry and backoff.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/generate` endpoint.
//!
//! Also provides [`parse_json_reply`], which tolerates the markdown code
//! fences models like to wrap JSON in.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CompletionConfig;

/// A text-completion capability: one prompt in, one text reply out.
///
/// Implementations may fail on transport or auth errors; callers decide
/// whether a failure is recoverable.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt`, producing at most `max_tokens` tokens.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

// ============ Disabled Provider ============

/// A no-op provider that always returns errors.
///
/// Used when `completion.provider = "disabled"`. The matching pipeline still
/// runs against it: every AI stage falls back to its default.
pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Completion provider using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(config.call_timeout())
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": self.temperature,
        });

        let json = post_with_retry(self.max_retries, "OpenAI", || {
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        parse_openai_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completion response.
fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama Provider ============

/// Completion provider using a local Ollama instance.
///
/// Calls `POST /api/generate` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        let client = reqwest::Client::builder()
            .timeout(config.call_timeout())
            .build()?;

        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": max_tokens,
                "temperature": self.temperature,
            },
        });

        let json = post_with_retry(self.max_retries, "Ollama", || {
            self.client
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await
        .map_err(|e| anyhow::anyhow!("{} (is Ollama running at {}?)", e, self.url))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

/// Send a JSON POST built by `build`, retrying 429/5xx and network errors
/// with exponential backoff, and return the parsed response body.
async fn post_with_retry<F>(max_retries: u32, label: &str, build: F) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(attempt, delay_secs = delay.as_secs(), "{} retry", label);
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    warn!(%status, attempt, "{} API transient error", label);
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        label,
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429): fail now
                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                warn!(error = %e, attempt, "{} request failed", label);
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} completion failed after retries", label)))
}

/// Create the appropriate [`CompletionProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

/// Strip surrounding whitespace and markdown code fences from a model reply.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = match rest.get(..4) {
                Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
                _ => rest,
            };
            rest.trim_end_matches('`').trim()
        }
        None => trimmed,
    }
}

/// Parse a model reply as JSON of type `T`, tolerating code fences.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    serde_json::from_str(strip_code_fences(raw))
}
