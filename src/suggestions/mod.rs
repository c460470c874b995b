//! Category suggestions for a new expense.
//!
//! Ranking is a synchronous analysis step, so it runs on a
//! [`BoundedTaskRunner`] and never holds the caller past the deadline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::OpenRouterResult;
use crate::observability::EventLogger;
use crate::runner::{BoundedTaskRunner, TaskContext};

/// Default number of suggestions returned.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// Default deadline for a suggestion run.
pub const DEFAULT_SUGGESTION_DEADLINE: Duration = Duration::from_secs(2);

/// A user category together with how often it has been used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUsage {
    /// Category ID.
    pub id: Uuid,
    /// Category name.
    pub name: String,
    /// Number of expenses filed under the category.
    #[serde(default)]
    pub usage_count: u64,
}

/// A suggested category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    /// Category ID.
    pub id: Uuid,
    /// Category name.
    pub name: String,
    /// Number of expenses filed under the category.
    pub usage_count: u64,
}

impl From<&CategoryUsage> for CategorySuggestion {
    fn from(category: &CategoryUsage) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            usage_count: category.usage_count,
        }
    }
}

/// Ranks categories by usage, most used first, keeping at most `limit`.
///
/// Ties keep their input order.
pub fn rank_by_usage(categories: &[CategoryUsage], limit: usize) -> Vec<CategorySuggestion> {
    let mut ranked: Vec<&CategoryUsage> = categories.iter().collect();
    ranked.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    ranked
        .into_iter()
        .take(limit)
        .map(CategorySuggestion::from)
        .collect()
}

/// Suggests categories for an expense under a deadline.
#[derive(Debug)]
pub struct CategorySuggester {
    runner: BoundedTaskRunner,
    deadline: Duration,
    processing_delay: Option<Duration>,
    limit: usize,
}

impl CategorySuggester {
    /// Creates a suggester that reports timeouts to `logger`.
    pub fn new(logger: Arc<dyn EventLogger>) -> Self {
        Self {
            runner: BoundedTaskRunner::new(logger),
            deadline: DEFAULT_SUGGESTION_DEADLINE,
            processing_delay: None,
            limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Adds a fixed delay before ranking, standing in for model latency.
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = Some(delay);
        self
    }

    /// Sets how many suggestions are returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Returns the deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Suggests categories for the expense.
    ///
    /// The amount is accepted for future analysis but does not affect the
    /// ranking yet. Fails with `TaskTimeout` when the deadline passes.
    pub async fn suggest(
        &self,
        user_id: &str,
        description: &str,
        amount: f64,
        categories: Vec<CategoryUsage>,
    ) -> OpenRouterResult<Vec<CategorySuggestion>> {
        tracing::debug!(
            user_id,
            amount,
            categories = categories.len(),
            "Suggesting categories"
        );

        let ctx = TaskContext::new(user_id, description);
        let delay = self.processing_delay;
        let limit = self.limit;

        self.runner
            .run_with_timeout(
                &ctx,
                move || {
                    if let Some(delay) = delay {
                        std::thread::sleep(delay);
                    }
                    rank_by_usage(&categories, limit)
                },
                self.deadline,
            )
            .await
    }
}
