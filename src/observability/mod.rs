//! Observability module for the OpenRouter client.
//!
//! Provides tracing setup, request timing and the application event log.

mod events;
mod logging;

pub use events::{
    log_best_effort, truncate_chars, EventLogError, EventLogger, LogEntry, LogKind,
    NoopEventLogger, TracingEventLogger, MAX_ERROR_CODE_CHARS, MAX_MESSAGE_CHARS,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use std::time::{Duration, Instant};

/// Request timer for measuring operation duration.
pub struct RequestTimer {
    start: Instant,
    operation: &'static str,
}

impl RequestTimer {
    /// Starts a timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the elapsed time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}
