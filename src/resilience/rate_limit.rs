//! Rate-limit handling for HTTP 429 responses.

use std::time::Duration;

/// Parses a `Retry-After` header given in (possibly fractional) seconds.
///
/// HTTP-date values and garbage yield `None`.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let secs = value?.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// How long to sleep after a 429 before the attempt is handed back for retry.
///
/// Never shorter than the back-off factor, so a `Retry-After: 0` still waits.
pub fn rate_limit_wait(retry_after: Option<Duration>, backoff_factor: f64) -> Duration {
    let floor = Duration::try_from_secs_f64(backoff_factor).unwrap_or(Duration::ZERO);
    retry_after.unwrap_or(Duration::ZERO).max(floor)
}
