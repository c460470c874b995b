//! Retry policy with exponential back-off.
//!
//! Each attempt reports an [`AttemptOutcome`]; the driver loops on it, so the
//! retry state machine never relies on errors for control transfer.

use std::future::Future;
use std::time::Duration;
use tracing::instrument;

use super::rate_limit::rate_limit_wait;
use crate::errors::{ApiErrorResponse, OpenRouterError, OpenRouterResult};
use crate::transport::{HttpResponse, TransportError};

/// Result of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed transiently and may be retried.
    Retry(OpenRouterError),
    /// The attempt failed terminally.
    Fail(OpenRouterError),
}

/// Classifies an HTTP response.
///
/// 429 and 5xx are retryable, 2xx succeeds, anything else is terminal.
pub fn classify_response(response: HttpResponse) -> AttemptOutcome<HttpResponse> {
    match response.status {
        429 => AttemptOutcome::Retry(OpenRouterError::RateLimited {
            retry_after: super::parse_retry_after(response.header("retry-after")),
        }),
        status @ 500..=599 => AttemptOutcome::Retry(OpenRouterError::Server { status }),
        _ if response.is_success() => AttemptOutcome::Success(response),
        status => AttemptOutcome::Fail(OpenRouterError::Http {
            status,
            message: error_message(&response),
        }),
    }
}

/// Classifies a transport failure. Only timeouts are retryable.
pub fn classify_transport_error<T>(error: TransportError) -> AttemptOutcome<T> {
    match error {
        TransportError::Timeout { timeout } => {
            AttemptOutcome::Retry(OpenRouterError::Timeout { timeout })
        }
        other => AttemptOutcome::Fail(other.into()),
    }
}

fn error_message(response: &HttpResponse) -> String {
    if let Ok(body) = response.json::<ApiErrorResponse>() {
        return body.error.message;
    }
    let text = String::from_utf8_lossy(&response.body);
    if text.trim().is_empty() {
        format!("HTTP status {}", response.status)
    } else {
        text.chars().take(500).collect()
    }
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Back-off base: the wait after failed attempt `n` is `factor^(n-1)` seconds.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_RETRIES,
            backoff_factor: crate::config::DEFAULT_BACKOFF_FACTOR,
        }
    }
}

/// Retry policy with exponential back-off and no jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.config.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Runs `operation` until it succeeds, fails terminally or attempts run out.
    ///
    /// The operation receives the 1-based attempt number. A rate-limited
    /// attempt sleeps for the rate-limit wait first and then, if attempts
    /// remain, for the ordinary back-off delay.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> OpenRouterResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match operation(attempt).await {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::Fail(err) => return Err(err),
                AttemptOutcome::Retry(err) => err,
            };

            if let OpenRouterError::RateLimited { retry_after } = &err {
                let wait = rate_limit_wait(*retry_after, self.config.backoff_factor);
                tracing::warn!(
                    sleep_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "openrouter.rate_limit"
                );
                tokio::time::sleep(wait).await;
            }

            if attempt >= max_attempts {
                return Err(OpenRouterError::RetriesExhausted {
                    attempts: attempt,
                    last_error: Box::new(err),
                });
            }

            let delay = self.backoff_delay(attempt);
            tracing::info!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Retrying after error"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
