//! Shared HTTP plumbing for catalog adapters
//!
//! Every catalog call goes through [`send_json`]/[`send_ok`], which apply the
//! bounded retry policy: 429s, 5xx responses and transport failures are
//! retried with capped exponential backoff, 4xx responses fail immediately.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::warn;

use crate::config::HttpConfig;
use crate::errors::ServiceError;

/// Bounded retry with capped exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_cap_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(cfg: &HttpConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff_ms: cfg.backoff_ms,
            backoff_cap_ms: cfg.backoff_cap_ms,
        }
    }

    /// Delay before retry number `attempt` (0-based), doubling up to the cap.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.backoff_cap_ms);
        Duration::from_millis(exp)
    }
}

/// Build a reqwest client with the configured request timeout.
pub fn build_client(cfg: &HttpConfig) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .map_err(ServiceError::Transport)
}

/// Send a request and decode the JSON body, retrying retryable failures.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    policy: &RetryPolicy,
) -> Result<T, ServiceError> {
    let response = send_with_retry(request, policy).await?;
    response.json::<T>().await.map_err(ServiceError::Transport)
}

/// Send a request and discard the body. Some write endpoints return 204.
pub async fn send_ok(request: RequestBuilder, policy: &RetryPolicy) -> Result<(), ServiceError> {
    send_with_retry(request, policy).await.map(|_| ())
}

async fn send_with_retry(
    request: RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, ServiceError> {
    let mut attempt = 0u32;
    loop {
        let cloned = request
            .try_clone()
            .ok_or_else(|| ServiceError::BadResponse("non-cloneable request".to_string()))?;

        let error = match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                classify_status(status, response).await
            }
            Err(e) => ServiceError::Transport(e),
        };

        if !error.is_retryable() || attempt >= policy.max_retries {
            return Err(error);
        }

        let backoff = policy.delay(attempt);
        warn!(
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "http.retry"
        );
        sleep(backoff).await;
        attempt += 1;
    }
}

async fn classify_status(status: StatusCode, response: reqwest::Response) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ServiceError::RateLimited;
    }
    if status.is_server_error() {
        return ServiceError::Upstream {
            status: status.as_u16(),
        };
    }
    let message = response.text().await.unwrap_or_default();
    ServiceError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_ms: 300,
            backoff_cap_ms: 1000,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(300));
        assert_eq!(policy.delay(1), Duration::from_millis(600));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        // capped from here on
        assert_eq!(policy.delay(10), Duration::from_millis(1000));
    }
}
