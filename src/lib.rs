//! OpenRouter Client Library
//!
//! A resilient Rust client for the OpenRouter chat completions API, plus the
//! deadline-bounded runner used by the expense assistant features built on it.
//!
//! # Features
//!
//! - **Chat Completions**: single-shot requests with configurable defaults
//! - **Resilience**: exponential back-off for 429, 5xx and timeouts, honouring `Retry-After`
//! - **Strict JSON**: assistant content validated against a JSON Schema
//! - **Secret Masking**: the API key never reaches the logs in clear text
//! - **Bounded Tasks**: blocking analysis run under a hard wall-clock deadline
//! - **Observability**: `tracing` events and a pluggable application event log
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use openrouter_client::{ChatMessage, CompletionOptions, OpenRouterClient, ResponseFormat};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenRouterClient::builder()
//!         .api_key("sk-or-your-key")
//!         .default_system_prompt("You are a concise assistant.")
//!         .build()?;
//!
//!     let schema = json!({
//!         "type": "object",
//!         "properties": {"answer": {"type": "string"}},
//!         "required": ["answer"]
//!     });
//!     let options = CompletionOptions::new()
//!         .temperature(0.2)
//!         .response_format(ResponseFormat::json_schema(schema, true));
//!
//!     let response = client
//!         .chat_completion(vec![ChatMessage::user("Capital of France?")], options)
//!         .await?;
//!     println!("{}", response.content().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! # Bounded Tasks
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use openrouter_client::{BoundedTaskRunner, TaskContext, TracingEventLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = BoundedTaskRunner::new(Arc::new(TracingEventLogger));
//!     let ctx = TaskContext::new("user-42", "Weekly groceries");
//!
//!     let total = runner
//!         .run_with_timeout(&ctx, || (1..=10).sum::<u32>(), Duration::from_secs(2))
//!         .await?;
//!     println!("{}", total);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod resilience;
pub mod runner;
pub mod services;
pub mod suggestions;
pub mod tips;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{OpenRouterClient, OpenRouterClientBuilder};
pub use config::{OpenRouterConfig, OpenRouterConfigBuilder};
pub use errors::{OpenRouterError, OpenRouterResult};

pub use auth::SecretMasker;
pub use observability::{
    EventLogger, LogEntry, LoggingConfig, NoopEventLogger, TracingEventLogger,
};
pub use runner::{BoundedTaskRunner, TaskContext};
pub use suggestions::{CategorySuggester, CategorySuggestion, CategoryUsage};
pub use tips::{AiTip, ExpenseSnapshot, TipsService};

// Type re-exports
pub use types::chat::{
    ChatMessage, CompletionOptions, CompletionRequest, CompletionResponse, JsonSchemaFormat,
    ResponseFormat, Role,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
