//! Completion provider configuration.

use std::time::Duration;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::client::{ModelParams, RetryPolicy};

/// Provider endpoint, model parameters and retry settings.
///
/// Every field has a default, so a partial `[completion]` table in the
/// config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// API key stored in the config file; the environment variable wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one.
    pub base_delay_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_owned(),
            model: "llama-3.3-70b-versatile".to_owned(),
            api_key_env: "GROQ_API_KEY".to_owned(),
            api_key: None,
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.9,
            timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl CompletionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            attempt_timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    /// Resolve the API key: environment variable, then config file.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(&self.api_key_env) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => Ok(key.clone()),
            _ => bail!(
                "completion API key not found; set {} or completion.api_key in the config file",
                self.api_key_env
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_planning_parameters() {
        let cfg = CompletionConfig::default();
        assert_eq!(cfg.max_tokens, 2000);
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert!((cfg.top_p - 0.9).abs() < f32::EPSILON);

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.attempt_timeout, Duration::from_secs(30));
    }

    #[test]
    fn partial_table_fills_defaults() {
        let cfg: CompletionConfig = from_json(r#"{"model":"mixtral-8x7b-32768","max_attempts":5}"#);
        assert_eq!(cfg.model, "mixtral-8x7b-32768");
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.base_url, CompletionConfig::default().base_url);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let cfg = CompletionConfig {
            max_attempts: 0,
            ..CompletionConfig::default()
        };
        assert_eq!(cfg.retry_policy().max_attempts, 1);
    }

    #[test]
    fn api_key_falls_back_to_file_value() {
        let cfg = CompletionConfig {
            api_key_env: "GOALPLAN_TEST_UNSET_KEY_VAR".to_owned(),
            api_key: Some("from-file".to_owned()),
            ..CompletionConfig::default()
        };
        assert_eq!(cfg.resolve_api_key().unwrap(), "from-file");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let cfg = CompletionConfig {
            api_key_env: "GOALPLAN_TEST_UNSET_KEY_VAR".to_owned(),
            ..CompletionConfig::default()
        };
        let msg = cfg.resolve_api_key().unwrap_err().to_string();
        assert!(msg.contains("GOALPLAN_TEST_UNSET_KEY_VAR"), "{msg}");
    }

    fn from_json(json: &str) -> CompletionConfig {
        serde_json::from_str(json).expect("config should deserialize")
    }
}
