//! Integration tests using WireMock
//!
//! These tests drive the real reqwest transport against a mock HTTP server,
//! covering serialization, authentication, retries and health checks.

mod chat_completions;
mod health;
mod resilience;

use openrouter_client::{OpenRouterClient, OpenRouterClientBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

/// API key used by every test client.
pub const TEST_API_KEY: &str = "sk-or-integration-key";

/// Starts a mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Returns a client builder pointing at the mock server.
pub fn client_builder(server: &MockServer) -> OpenRouterClientBuilder {
    OpenRouterClient::builder()
        .api_key(TEST_API_KEY)
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
}

/// Builds a chat completion body with the given assistant content.
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "gen-integration-123",
        "model": "openrouter/azure/gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

/// Helper to create success response templates
pub fn success_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(completion_body(content))
}

/// Helper to create error response templates
pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"message": message, "code": status}
    }))
}
