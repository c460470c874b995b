//! Bounded task runner.
//!
//! Runs a synchronous, possibly slow computation on the blocking pool under a
//! wall-clock deadline. At most one task per runner is in flight: the permit
//! travels with the blocking closure, so a task abandoned after its deadline
//! keeps the slot until it actually finishes.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::errors::{OpenRouterError, OpenRouterResult};
use crate::observability::{log_best_effort, truncate_chars, EventLogger, LogEntry};

/// Error code recorded when a task misses its deadline.
pub const TIMEOUT_ERROR_CODE: &str = "AI_TIMEOUT";

/// Characters of the task description kept in the timeout event.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// Identifies a task in the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    /// User the task runs for.
    pub user_id: String,
    /// Free-text description of the work, truncated when logged.
    pub description: String,
}

impl TaskContext {
    /// Creates a task context.
    pub fn new(user_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            description: description.into(),
        }
    }
}

/// Single-slot runner for blocking work with a deadline.
pub struct BoundedTaskRunner {
    permits: Arc<Semaphore>,
    logger: Arc<dyn EventLogger>,
}

impl BoundedTaskRunner {
    /// Creates a runner that reports timeouts to `logger`.
    pub fn new(logger: Arc<dyn EventLogger>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            logger,
        }
    }

    /// Returns true if no task currently holds the slot.
    pub fn is_idle(&self) -> bool {
        self.permits.available_permits() > 0
    }

    /// Runs `task` and waits at most `timeout` for its result.
    ///
    /// Waiting for the slot counts against the deadline. On timeout the task
    /// is abandoned, not stopped; one `AI_TIMEOUT` event is written and
    /// [`OpenRouterError::TaskTimeout`] is returned. A panicking task yields
    /// [`OpenRouterError::TaskFailed`].
    pub async fn run_with_timeout<F, T>(
        &self,
        ctx: &TaskContext,
        task: F,
        timeout: Duration,
    ) -> OpenRouterResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let permits = Arc::clone(&self.permits);

        let work = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| OpenRouterError::TaskFailed {
                    message: e.to_string(),
                })?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                task()
            })
            .await
            .map_err(|e| OpenRouterError::TaskFailed {
                message: e.to_string(),
            })
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed = started.elapsed();
                self.report_timeout(ctx, timeout, elapsed);
                Err(OpenRouterError::TaskTimeout { timeout, elapsed })
            }
        }
    }

    fn report_timeout(&self, ctx: &TaskContext, timeout: Duration, elapsed: Duration) {
        let preview = truncate_chars(&ctx.description, DESCRIPTION_PREVIEW_CHARS);

        tracing::warn!(
            user_id = %ctx.user_id,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Bounded task timed out"
        );

        let message = format!(
            "AI suggestion timed out after {} seconds for description: {}",
            timeout.as_secs_f64(),
            preview
        );
        log_best_effort(
            self.logger.as_ref(),
            LogEntry::error(ctx.user_id.clone(), TIMEOUT_ERROR_CODE, &message),
        );
    }
}

impl std::fmt::Debug for BoundedTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedTaskRunner")
            .field("idle", &self.is_idle())
            .finish_non_exhaustive()
    }
}
