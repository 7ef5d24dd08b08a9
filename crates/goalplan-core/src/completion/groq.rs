//! OpenAI-compatible chat completions provider (Groq by default).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::config::CompletionConfig;
use super::provider::{CompletionProvider, CompletionRequest, ProviderError};

/// Calls `POST {base_url}/chat/completions` with bearer authentication.
#[derive(Debug, Clone)]
pub struct GroqProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GroqProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Build a provider from config, resolving the API key.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("body is not JSON: {e}")))?;
        first_choice_content(&value)
    }
}

impl GroqProvider {
    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// JSON body of a non-streaming chat completion request.
pub fn request_body(request: &CompletionRequest) -> Value {
    json!({
        "model": request.model,
        "messages": request.messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "top_p": request.top_p,
        "stream": false,
    })
}

/// Extract `error.message` from an error body, or fall back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

fn first_choice_content(value: &Value) -> Result<String, ProviderError> {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message.content".to_owned()))
}
