//! Personalised financial tips generated through chat completions.
//!
//! [`TipsService::get_tips`] always yields at least one tip: provider
//! failures are written to the event log and replaced by a generic tip.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::client::OpenRouterClient;
use crate::errors::OpenRouterResult;
use crate::observability::{log_best_effort, EventLogger, LogEntry};
use crate::types::chat::{ChatMessage, CompletionOptions};

/// Upper bound on tips per call.
pub const MAX_TIPS: usize = 3;

/// Error code recorded when tip generation fails.
pub const TIPS_ERROR_CODE: &str = "AI_TIPS_ERROR";

/// Tip returned when nothing usable came back.
pub const GENERIC_TIP: &str =
    "Consider reviewing your recent expenses to identify potential savings opportunities.";

const SYSTEM_PROMPT: &str = "You are a helpful financial advisor assistant.";

const NEW_USER_PROMPT: &str = r#"You are a financial advisor assistant. The user is new and has not recorded any expenses yet.

Provide up to three concise, specific and actionable financial tips for new users.

Respond ONLY with the tips as a JSON array, each element having a "message" field.
Focus on:
1. Getting started with expense tracking
2. Basic financial health
3. Building a tracking habit

Format example:
[
    {"message": "Track every expense for one week to get a baseline of your spending habits."},
    {"message": "Create categories for your regular expenses to see where your money goes."}
]"#;

const DATA_PROMPT_HEADER: &str = "You are a financial advisor assistant. Based on the following expense data, \
provide up to three concise, specific and actionable financial tips.\n\nUser's recent expenses:\n";

const DATA_PROMPT_FOOTER: &str = r#"

Respond ONLY with the tips as a JSON array, each element having a "message" field.
Focus on:
1. Spending trends and anomalies
2. Budget recommendations
3. Savings opportunities

Format example:
[
    {"message": "Your dining out expenses increased by 20% this week."},
    {"message": "Consider setting a budget for entertainment."}
]"#;

/// A single tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTip {
    /// Tip text.
    pub message: String,
}

impl AiTip {
    /// Creates a tip.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The fallback tip.
    pub fn generic() -> Self {
        Self::new(GENERIC_TIP)
    }
}

/// Recent spending supplied by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSnapshot {
    /// Most recent expenses, newest first.
    #[serde(default)]
    pub recent_expenses: Vec<Value>,
    /// Per-category totals over the same window.
    #[serde(default)]
    pub category_summary: Vec<Value>,
}

impl ExpenseSnapshot {
    /// Returns true when there is no expense history to reason about.
    pub fn is_new_user(&self) -> bool {
        self.recent_expenses.is_empty()
    }
}

/// Builds the user prompt for a snapshot.
pub fn build_prompt(snapshot: &ExpenseSnapshot) -> OpenRouterResult<String> {
    if snapshot.is_new_user() {
        return Ok(NEW_USER_PROMPT.to_string());
    }
    let data = serde_json::to_string_pretty(snapshot)?;
    Ok(format!("{DATA_PROMPT_HEADER}{data}{DATA_PROMPT_FOOTER}"))
}

/// Extracts at most `limit` tips from assistant content.
///
/// A JSON array of `{"message": ...}` objects is preferred. Content that is
/// not a JSON array falls back to plain lines of 11 to 199 characters that do
/// not look like JSON. Returns the generic tip when nothing qualifies.
pub fn parse_tips(content: Option<&str>, limit: usize) -> Vec<AiTip> {
    let content = content.unwrap_or_default();

    let tips: Vec<AiTip> = match serde_json::from_str::<Vec<Value>>(content) {
        Ok(items) => items
            .iter()
            .take(limit)
            .filter_map(|item| item.get("message")?.as_str())
            .map(AiTip::new)
            .collect(),
        Err(_) => content
            .lines()
            .map(str::trim)
            .filter(|line| is_tip_line(line))
            .take(limit)
            .map(AiTip::new)
            .collect(),
    };

    if tips.is_empty() {
        vec![AiTip::generic()]
    } else {
        tips
    }
}

fn is_tip_line(line: &str) -> bool {
    let len = line.chars().count();
    len > 10 && len < 200 && !line.starts_with('{') && !line.starts_with('[')
}

/// Generates tips for a user.
pub struct TipsService {
    client: Arc<OpenRouterClient>,
    logger: Arc<dyn EventLogger>,
}

impl TipsService {
    /// Creates a tips service.
    pub fn new(client: Arc<OpenRouterClient>, logger: Arc<dyn EventLogger>) -> Self {
        Self { client, logger }
    }

    /// Returns between one and `limit` tips (`limit` is clamped to 1..=3).
    pub async fn get_tips(
        &self,
        user_id: &str,
        snapshot: &ExpenseSnapshot,
        limit: usize,
    ) -> Vec<AiTip> {
        let limit = limit.clamp(1, MAX_TIPS);

        match self.fetch_tips(snapshot, limit).await {
            Ok(tips) => tips,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "Falling back to generic tip");
                log_best_effort(
                    self.logger.as_ref(),
                    LogEntry::error(
                        user_id,
                        TIPS_ERROR_CODE,
                        &format!("Error getting AI tips: {}", err),
                    ),
                );
                vec![AiTip::generic()]
            }
        }
    }

    async fn fetch_tips(
        &self,
        snapshot: &ExpenseSnapshot,
        limit: usize,
    ) -> OpenRouterResult<Vec<AiTip>> {
        let prompt = build_prompt(snapshot)?;
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let options = CompletionOptions::new().temperature(0.7).max_tokens(300);

        let response = self.client.chat_completion(messages, options).await?;
        Ok(parse_tips(response.content(), limit))
    }
}

impl std::fmt::Debug for TipsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TipsService")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
