//! Classified completion errors.

use thiserror::Error;

use super::provider::ProviderError;

/// Outcome classes of a failed completion call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Timeout, network failure or rate limiting. Retried.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Invalid or missing credentials. Never retried.
    #[error("provider authentication failed: {0}")]
    Auth(String),

    /// Any other provider failure. Retried like a transient error.
    #[error("unclassified provider error: {0}")]
    Unclassified(String),

    /// Every attempt failed.
    #[error("completion service unavailable after {attempts} attempt(s): {last_error}")]
    ServiceUnavailable { attempts: u32, last_error: String },
}

impl CompletionError {
    /// Classify a raw provider failure by status code and message signature.
    ///
    /// Rate-limit signatures are checked before authentication signatures.
    pub fn classify(err: &ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::Timeout(_) | ProviderError::Network(_) => Self::Transient(message),
            ProviderError::Http { status: 429, .. } => Self::Transient(message),
            _ if is_rate_limit_message(&message) => Self::Transient(message),
            ProviderError::Http {
                status: 401 | 403, ..
            } => Self::Auth(message),
            _ if is_auth_message(&message) => Self::Auth(message),
            ProviderError::Http {
                status: 408 | 500..=599,
                ..
            } => Self::Transient(message),
            _ => Self::Unclassified(message),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Unclassified(_))
    }

    /// Whether this is a credentials problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate_limit") || lower.contains("rate limit")
}

fn is_auth_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["api_key", "api key", "authentication", "unauthorized"]
        .iter()
        .any(|signature| lower.contains(signature))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn http(status: u16, message: &str) -> ProviderError {
        ProviderError::Http {
            status,
            message: message.to_owned(),
        }
    }

    #[test]
    fn timeouts_and_network_failures_are_transient() {
        let timeout = CompletionError::classify(&ProviderError::Timeout(Duration::from_secs(30)));
        assert!(matches!(timeout, CompletionError::Transient(_)));

        let network = CompletionError::classify(&ProviderError::Network("reset".into()));
        assert!(matches!(network, CompletionError::Transient(_)));
    }

    #[test]
    fn rate_limits_are_transient() {
        assert!(matches!(
            CompletionError::classify(&http(429, "slow down")),
            CompletionError::Transient(_)
        ));
        assert!(matches!(
            CompletionError::classify(&http(400, "rate_limit_exceeded")),
            CompletionError::Transient(_)
        ));
    }

    #[test]
    fn auth_signatures_are_auth() {
        assert!(CompletionError::classify(&http(401, "nope")).is_auth());
        assert!(CompletionError::classify(&http(403, "forbidden")).is_auth());
        assert!(CompletionError::classify(&http(400, "Invalid API Key")).is_auth());
        assert!(
            CompletionError::classify(&ProviderError::InvalidResponse(
                "authentication required".into()
            ))
            .is_auth()
        );
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [408, 500, 502, 503, 504] {
            assert!(
                matches!(
                    CompletionError::classify(&http(status, "oops")),
                    CompletionError::Transient(_)
                ),
                "status {status}"
            );
        }
    }

    #[test]
    fn everything_else_is_unclassified() {
        let err = CompletionError::classify(&http(400, "bad request"));
        assert!(matches!(err, CompletionError::Unclassified(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_and_exhaustion_are_not_retryable() {
        assert!(!CompletionError::Auth("x".into()).is_retryable());
        assert!(
            !CompletionError::ServiceUnavailable {
                attempts: 3,
                last_error: "x".into()
            }
            .is_retryable()
        );
    }
}
