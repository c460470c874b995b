//! API services.

mod chat;
mod models;

pub use chat::{validate_strict_content, ChatService};
pub use models::{ModelsService, HEALTH_CHECK_TIMEOUT};
