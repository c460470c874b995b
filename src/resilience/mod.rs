//! Resilience layer for the OpenRouter client.
//!
//! Provides the retry decision functions, the back-off driver and the
//! rate-limit wait applied to HTTP 429 responses.

mod rate_limit;
mod retry;

pub use rate_limit::{parse_retry_after, rate_limit_wait};
pub use retry::{
    classify_response, classify_transport_error, AttemptOutcome, RetryConfig, RetryPolicy,
};
