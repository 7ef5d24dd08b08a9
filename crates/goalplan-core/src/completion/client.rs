//! Retrying completion client.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::config::CompletionConfig;
use super::error::CompletionError;
use super::provider::{ChatMessage, CompletionProvider, CompletionRequest, ProviderError, Role};
use crate::plan::PlanningPrompt;

/// How often, how patiently and how long to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, where `attempt` is 1-based.
    ///
    /// `base * 2^(attempt - 1)`: 1s after the first failure, 2s after the second.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Fixed model parameters sent with every planning request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        CompletionConfig::default().model_params()
    }
}

/// Sends planning prompts through a [`CompletionProvider`], retrying
/// transient and unclassified failures with exponential backoff.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    params: ModelParams,
    policy: RetryPolicy,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider.name())
            .field("params", &self.params)
            .field("policy", &self.policy)
            .finish()
    }
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &CompletionConfig) -> Self {
        Self {
            provider,
            params: config.model_params(),
            policy: config.retry_policy(),
        }
    }

    pub fn with_policy(
        provider: Arc<dyn CompletionProvider>,
        params: ModelParams,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            params,
            policy,
        }
    }

    /// Send the prompt and return the trimmed response text.
    ///
    /// Authentication failures return immediately. Any other failure is
    /// retried until `max_attempts` is reached, after which
    /// [`CompletionError::ServiceUnavailable`] is returned.
    pub async fn call(&self, prompt: &PlanningPrompt) -> Result<String, CompletionError> {
        let request = self.request_for(prompt);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay_after(attempt - 1);
                warn!(
                    provider = self.provider.name(),
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "retrying completion request"
                );
                tokio::time::sleep(delay).await;
            }

            let outcome =
                match tokio::time::timeout(self.policy.attempt_timeout, self.provider.complete(&request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(self.policy.attempt_timeout)),
                };

            match outcome {
                Ok(text) => {
                    debug!(
                        provider = self.provider.name(),
                        attempt,
                        bytes = text.len(),
                        "completion succeeded"
                    );
                    return Ok(text.trim().to_owned());
                }
                Err(err) => {
                    let classified = CompletionError::classify(&err);
                    if classified.is_auth() {
                        error!(
                            provider = self.provider.name(),
                            error = %classified,
                            "completion authentication failed"
                        );
                        return Err(classified);
                    }
                    last_error = classified.to_string();
                }
            }
        }

        error!(
            provider = self.provider.name(),
            attempts = max_attempts,
            error = %last_error,
            "completion attempts exhausted"
        );
        Err(CompletionError::ServiceUnavailable {
            attempts: max_attempts,
            last_error,
        })
    }

    fn request_for(&self, prompt: &PlanningPrompt) -> CompletionRequest {
        CompletionRequest {
            model: self.params.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            top_p: self.params.top_p,
        }
    }
}
