//! Calls to the external completion provider.
//!
//! [`CompletionProvider`] is the seam to the provider itself (one HTTP call,
//! no policy). [`CompletionClient`] wraps a provider with per-attempt
//! timeouts, retries with exponential backoff, and error classification.

pub mod client;
pub mod config;
pub mod error;
pub mod groq;
pub mod provider;

pub use client::{CompletionClient, ModelParams, RetryPolicy};
pub use config::CompletionConfig;
pub use error::CompletionError;
pub use groq::GroqProvider;
pub use provider::{ChatMessage, CompletionProvider, CompletionRequest, ProviderError, Role};
