//! Application event log.
//!
//! Error and info events are handed to an external sink (typically a `logs`
//! table). Writing to the sink must never change the outcome of the operation
//! being logged, so callers go through [`log_best_effort`].

use serde::Serialize;

/// Maximum stored message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Maximum stored error code length, in characters.
pub const MAX_ERROR_CODE_CHARS: usize = 50;

/// Kind of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Informational entry.
    Info,
    /// Warning entry.
    Warning,
    /// Error entry.
    Error,
}

/// A single entry for the event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// User the event belongs to.
    pub user_id: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Classification code, set for errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Message, already truncated.
    pub message: String,
}

impl LogEntry {
    /// Creates an error entry.
    pub fn error(user_id: impl Into<String>, error_code: &str, message: &str) -> Self {
        Self {
            user_id: user_id.into(),
            kind: LogKind::Error,
            error_code: Some(truncate_chars(error_code, MAX_ERROR_CODE_CHARS)),
            message: truncate_chars(message, MAX_MESSAGE_CHARS),
        }
    }

    /// Creates an info entry.
    pub fn info(user_id: impl Into<String>, message: &str) -> Self {
        Self {
            user_id: user_id.into(),
            kind: LogKind::Info,
            error_code: None,
            message: truncate_chars(message, MAX_MESSAGE_CHARS),
        }
    }
}

/// Failure reported by an event sink.
#[derive(Debug, thiserror::Error)]
#[error("Event sink error: {message}")]
pub struct EventLogError {
    /// Error message.
    pub message: String,
}

/// External event sink.
pub trait EventLogger: Send + Sync {
    /// Persists an entry.
    fn log(&self, entry: &LogEntry) -> Result<(), EventLogError>;
}

/// Writes an entry, swallowing sink failures.
pub fn log_best_effort(logger: &dyn EventLogger, entry: LogEntry) {
    if let Err(err) = logger.log(&entry) {
        tracing::warn!(
            user_id = %entry.user_id,
            error_code = entry.error_code.as_deref().unwrap_or(""),
            error = %err,
            "Failed to write event log entry"
        );
    }
}

/// Truncates to at most `max` characters, on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Event sink that emits entries as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn log(&self, entry: &LogEntry) -> Result<(), EventLogError> {
        let code = entry.error_code.as_deref().unwrap_or("");
        match entry.kind {
            LogKind::Error => tracing::error!(
                target: "openrouter_client::events",
                user_id = %entry.user_id,
                error_code = code,
                "{}",
                entry.message
            ),
            LogKind::Warning => tracing::warn!(
                target: "openrouter_client::events",
                user_id = %entry.user_id,
                error_code = code,
                "{}",
                entry.message
            ),
            LogKind::Info => tracing::info!(
                target: "openrouter_client::events",
                user_id = %entry.user_id,
                "{}",
                entry.message
            ),
        }
        Ok(())
    }
}

/// Event sink that discards all entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventLogger;

impl EventLogger for NoopEventLogger {
    fn log(&self, _entry: &LogEntry) -> Result<(), EventLogError> {
        Ok(())
    }
}
