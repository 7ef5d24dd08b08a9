//! The `CompletionProvider` trait and its request/error types.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a chat-style completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A complete, non-streaming completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// A raw failure reported by a provider, before classification.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Adapter interface for a natural-language completion service.
///
/// Implementations perform exactly one call per invocation; retrying and
/// timeouts belong to [`super::CompletionClient`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;

    /// Send the request and return the text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

// Compile-time assertion: the trait must stay usable as `dyn CompletionProvider`.
const _: () = {
    fn _assert_object_safe(_: &dyn CompletionProvider) {}
};
