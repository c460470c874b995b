//! Error types for the OpenRouter client.
//!
//! Separates transient failures (rate limits, server errors, timeouts) that the
//! retry driver resolves internally from terminal failures that reach callers.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for OpenRouter operations.
pub type OpenRouterResult<T> = Result<T, OpenRouterError>;

/// Error type for OpenRouter client and task runner operations.
#[derive(Debug, Error)]
pub enum OpenRouterError {
    /// Missing or invalid configuration (absent API key, bad base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// The provider answered HTTP 429.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Value of the `Retry-After` header, if the provider sent one.
        retry_after: Option<Duration>,
    },

    /// The provider answered with a 5xx status.
    #[error("Server error (HTTP {status})")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// A single request attempt exceeded its timeout.
    #[error("Request timeout after {timeout:?}")]
    Timeout {
        /// The per-attempt timeout that elapsed.
        timeout: Duration,
    },

    /// Non-retryable HTTP error (any 4xx other than 429).
    #[error("HTTP error {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Provider error message, or the raw body when it could not be parsed.
        message: String,
    },

    /// Connection-level failure that is not a timeout.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Every allowed attempt failed with a transient error.
    #[error("Request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error of the final attempt.
        last_error: Box<OpenRouterError>,
    },

    /// Assistant content failed strict JSON schema validation.
    #[error("Schema validation failed: {message}")]
    Schema {
        /// Validation message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// The provider response did not have the expected shape.
    #[error("Unexpected response format from OpenRouter API: {message}")]
    UnexpectedResponse {
        /// Error message.
        message: String,
    },

    /// A bounded task missed its deadline.
    #[error("Task timed out after {timeout:?}")]
    TaskTimeout {
        /// The deadline that was exceeded.
        timeout: Duration,
        /// Time the caller actually waited.
        elapsed: Duration,
    },

    /// A bounded task panicked or could not be scheduled.
    #[error("Task failed: {message}")]
    TaskFailed {
        /// Error message.
        message: String,
    },

    /// The client (or its transport) has been closed.
    #[error("Client is closed")]
    Closed,
}

impl OpenRouterError {
    /// Returns true if this error is retried by the back-off driver.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OpenRouterError::RateLimited { .. }
                | OpenRouterError::Server { .. }
                | OpenRouterError::Timeout { .. }
        )
    }

    /// Returns the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OpenRouterError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns true for a bounded task deadline failure.
    pub fn is_task_timeout(&self) -> bool {
        matches!(self, OpenRouterError::TaskTimeout { .. })
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        OpenRouterError::Configuration {
            message: message.into(),
        }
    }

    /// Creates an unexpected response error.
    pub fn unexpected_response(message: impl Into<String>) -> Self {
        OpenRouterError::UnexpectedResponse {
            message: message.into(),
        }
    }
}

/// API error response body from OpenRouter.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// The error details.
    pub error: ApiErrorDetail,
}

/// Detailed API error information.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    /// The error message.
    pub message: String,
    /// Provider error code, numeric or textual.
    pub code: Option<serde_json::Value>,
}

impl From<TransportError> for OpenRouterError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { timeout } => OpenRouterError::Timeout { timeout },
            TransportError::Closed => OpenRouterError::Closed,
            other => OpenRouterError::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for OpenRouterError {
    fn from(err: serde_json::Error) -> Self {
        OpenRouterError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for OpenRouterError {
    fn from(err: url::ParseError) -> Self {
        OpenRouterError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
