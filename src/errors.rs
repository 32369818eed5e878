//! Error types
//!
//! [`ServiceError`] covers every failure a catalog adapter can produce. The
//! retryable classes (rate limits, upstream 5xx, transport) are separated
//! from permanent ones so callers can retry without pattern-matching strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller-supplied input failed validation, nothing was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The catalog rejected the request with a client error.
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    /// The catalog asked us to slow down.
    #[error("rate limited")]
    RateLimited,

    /// The catalog failed on its side.
    #[error("upstream error {status}")]
    Upstream { status: u16 },

    /// The request never completed (timeout, connection reset, DNS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response arrived but was not in the expected shape.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The catalog does not support this operation.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl ServiceError {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::RateLimited | ServiceError::Upstream { .. } | ServiceError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ServiceError::RateLimited.is_retryable());
        assert!(ServiceError::Upstream { status: 503 }.is_retryable());

        assert!(!ServiceError::InvalidInput("x".into()).is_retryable());
        assert!(!ServiceError::Api {
            status: 404,
            message: "not found".into()
        }
        .is_retryable());
        assert!(!ServiceError::BadResponse("truncated".into()).is_retryable());
        assert!(!ServiceError::Unsupported("isrc search").is_retryable());
    }
}
