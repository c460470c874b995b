//! Chat completions service.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::auth::{AuthProvider, SecretMasker};
use crate::config::OpenRouterConfig;
use crate::errors::{OpenRouterError, OpenRouterResult};
use crate::observability::RequestTimer;
use crate::resilience::{classify_response, classify_transport_error, RetryConfig, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::chat::{
    ChatMessage, CompletionOptions, CompletionRequest, CompletionResponse, ResponseFormat, Role,
};

/// Chat completions service.
pub struct ChatService {
    config: Arc<OpenRouterConfig>,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    retry: RetryPolicy,
    masker: SecretMasker,
}

impl ChatService {
    /// Creates a new chat service.
    pub fn new(
        config: Arc<OpenRouterConfig>,
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let retry = RetryPolicy::new(RetryConfig {
            max_attempts: config.max_retries,
            backoff_factor: config.backoff_factor,
        });
        let masker = SecretMasker::new(config.api_key());

        Self {
            config,
            transport,
            auth,
            retry,
            masker,
        }
    }

    /// Resolves defaults into a complete request.
    ///
    /// The configured system prompt is prepended unless the conversation
    /// already opens with a system message; per-call parameters override the
    /// configured ones; a per-call response format replaces the default.
    pub fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> CompletionRequest {
        let mut messages = messages;
        if let Some(prompt) = &self.config.default_system_prompt {
            let starts_with_system = messages
                .first()
                .is_some_and(|message| message.role == Role::System);
            if !starts_with_system {
                messages.insert(0, ChatMessage::system(prompt.clone()));
            }
        }

        let mut params = self.config.default_params.clone();
        for (name, value) in &options.model_params {
            params.insert(name.clone(), value.clone());
        }

        CompletionRequest {
            model: self.config.model_name.clone(),
            messages,
            params,
            response_format: options
                .response_format
                .clone()
                .or_else(|| self.config.default_response_format.clone()),
        }
    }

    /// Sends a chat completion request and returns the full response body.
    ///
    /// Transient failures are retried internally; only the terminal outcome
    /// is returned. Under a strict `json_schema` response format the assistant
    /// content is validated before the response is handed back.
    #[instrument(skip(self, messages, options), fields(model = %self.config.model_name))]
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> OpenRouterResult<CompletionResponse> {
        let request = self.build_request(messages, &options);
        let http_request = self.build_http_request(&request)?;

        let response = self
            .retry
            .execute(|attempt| {
                let transport = Arc::clone(&self.transport);
                let req = http_request.clone();
                async move {
                    let timer = RequestTimer::start("chat_completion");
                    match transport.send(req).await {
                        Ok(resp) => {
                            tracing::info!(
                                operation = timer.operation(),
                                attempt,
                                status = resp.status,
                                duration_ms = timer.elapsed_ms(),
                                "openrouter.request"
                            );
                            classify_response(resp)
                        }
                        Err(err) => {
                            tracing::info!(
                                operation = timer.operation(),
                                attempt,
                                outcome = %err,
                                duration_ms = timer.elapsed_ms(),
                                "openrouter.request"
                            );
                            classify_transport_error(err)
                        }
                    }
                }
            })
            .await?;

        let completion = parse_body(&response)?;

        if let Some(schema) = request
            .response_format
            .as_ref()
            .and_then(ResponseFormat::strict_schema)
        {
            validate_strict_content(&completion, schema)?;
        }

        Ok(completion)
    }

    /// Sends a single user prompt and returns the assistant content.
    pub async fn generate_completion(
        &self,
        prompt: impl Into<String>,
        options: CompletionOptions,
    ) -> OpenRouterResult<String> {
        let response = self
            .chat_completion(vec![ChatMessage::user(prompt)], options)
            .await?;

        response.content().map(str::to_string).ok_or_else(|| {
            OpenRouterError::unexpected_response("missing choices[0].message.content")
        })
    }

    fn build_http_request(&self, request: &CompletionRequest) -> OpenRouterResult<HttpRequest> {
        let payload = request.to_payload()?;
        let body = serde_json::to_vec(&payload)?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("X-Title".to_string(), self.config.app_title.clone());
        self.auth.apply_auth(&mut headers);

        tracing::debug!(
            payload = %self.masker.mask_json(&payload),
            headers = ?self.masker.mask_headers(&headers),
            "openrouter.payload"
        );

        Ok(HttpRequest {
            headers,
            ..HttpRequest::post("chat/completions")
                .with_body(body)
                .with_timeout(self.config.timeout)
        })
    }
}

fn parse_body(response: &HttpResponse) -> OpenRouterResult<CompletionResponse> {
    let body: Value = response.json().map_err(|e| {
        OpenRouterError::unexpected_response(format!("response body is not JSON: {}", e))
    })?;
    Ok(CompletionResponse::new(body))
}

/// Validates the assistant content of `response` against `schema`.
pub fn validate_strict_content(
    response: &CompletionResponse,
    schema: &Value,
) -> OpenRouterResult<()> {
    let content = response.content().ok_or_else(|| {
        OpenRouterError::unexpected_response("missing choices[0].message.content")
    })?;

    let result = check_against_schema(content, schema);
    if let Err(OpenRouterError::Schema { message }) = &result {
        tracing::error!(error = %message, "openrouter.schema_error");
    }
    result
}

fn check_against_schema(content: &str, schema: &Value) -> OpenRouterResult<()> {
    let instance: Value = serde_json::from_str(content).map_err(|e| OpenRouterError::Schema {
        message: format!("assistant content is not valid JSON: {}", e),
    })?;

    let validator = jsonschema::validator_for(schema).map_err(|e| OpenRouterError::Schema {
        message: format!("invalid JSON schema: {}", e),
    })?;

    let messages: Vec<String> = validator
        .iter_errors(&instance)
        .take(3)
        .map(|err| err.to_string())
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(OpenRouterError::Schema {
            message: messages.join("; "),
        })
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("model", &self.config.model_name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyAuth;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::transport::{HttpMethod, TransportError};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    const API_KEY: &str = "sk-or-test-key-12345";

    fn service_with(
        transport: Arc<MockTransport>,
        configure: impl FnOnce(
            crate::config::OpenRouterConfigBuilder,
        ) -> crate::config::OpenRouterConfigBuilder,
    ) -> ChatService {
        let config = configure(OpenRouterConfig::builder().api_key(API_KEY))
            .build()
            .unwrap();
        ChatService::new(
            Arc::new(config),
            transport,
            Arc::new(ApiKeyAuth::from_string(API_KEY)),
        )
    }

    fn completion(content: &str) -> Value {
        json!({
            "id": "gen-123",
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    fn strict_format() -> ResponseFormat {
        ResponseFormat::json_schema(json!({"type": "object", "required": ["x"]}), true)
    }

    #[tokio::test]
    async fn test_chat_completion_success() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion("Hello!"));
        let service = service_with(Arc::clone(&transport), |b| b);

        let response = service
            .chat_completion(vec![ChatMessage::user("Hi")], CompletionOptions::new())
            .await
            .unwrap();

        assert_eq!(response.content(), Some("Hello!"));
        assert_eq!(response.as_json(), &completion("Hello!"));

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "chat/completions");
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&format!("Bearer {}", API_KEY))
        );
        assert_eq!(
            request.headers.get("X-Title"),
            Some(&"OpenRouterService".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_429_then_success() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(429, "rate limited").with_header("Retry-After", "0"));
        transport.queue_json(&completion("done"));
        let service = service_with(Arc::clone(&transport), |b| b.max_retries(2));

        let response = service
            .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
            .await
            .unwrap();

        assert_eq!(transport.request_count(), 2);
        assert_eq!(response.content(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_on_503() {
        let transport = Arc::new(MockTransport::new());
        transport.set_default(MockResponse::error(503, "unavailable"));
        let service = service_with(Arc::clone(&transport), |b| b.max_retries(2));

        let result = service
            .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
            .await;

        assert!(matches!(
            result,
            Err(OpenRouterError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_transport_error(TransportError::Timeout {
            timeout: Duration::from_secs(30),
        });
        transport.queue_json(&completion("late"));
        let service = service_with(Arc::clone(&transport), |b| b);

        let response = service
            .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
            .await
            .unwrap();

        assert_eq!(response.content(), Some("late"));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(401, "No auth credentials found");
        transport.queue_json(&completion("unreachable"));
        let service = service_with(Arc::clone(&transport), |b| b);

        let result = service
            .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
            .await;

        match result {
            Err(OpenRouterError::Http { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "No auth credentials found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_strict_schema_rejects_nonconforming_content() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion(r#"{"y":1}"#));
        let service = service_with(Arc::clone(&transport), |b| b);

        let result = service
            .chat_completion(
                vec![ChatMessage::user("Give me x")],
                CompletionOptions::new().response_format(strict_format()),
            )
            .await;

        assert!(matches!(result, Err(OpenRouterError::Schema { .. })));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_strict_schema_accepts_conforming_content() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion(r#"{"x":1}"#));
        let service = service_with(Arc::clone(&transport), |b| b);

        let response = service
            .chat_completion(
                vec![ChatMessage::user("Give me x")],
                CompletionOptions::new().response_format(strict_format()),
            )
            .await
            .unwrap();

        assert_eq!(response.into_json(), completion(r#"{"x":1}"#));
        let sent = transport.last_request_json().unwrap();
        assert_eq!(sent["response_format"]["type"], "json_schema");
        assert_eq!(sent["response_format"]["json_schema"]["strict"], true);
    }

    #[tokio::test]
    async fn test_strict_schema_rejects_non_json_content() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion("not json at all"));
        let service = service_with(Arc::clone(&transport), |b| b);

        let result = service
            .chat_completion(
                vec![ChatMessage::user("Give me x")],
                CompletionOptions::new().response_format(strict_format()),
            )
            .await;

        assert!(matches!(result, Err(OpenRouterError::Schema { .. })));
    }

    #[tokio::test]
    async fn test_non_strict_format_skips_validation() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion("plain text"));
        transport.queue_json(&completion(r#"{"y":1}"#));
        let service = service_with(Arc::clone(&transport), |b| b);

        let lenient = ResponseFormat::json_schema(json!({"type": "object", "required": ["x"]}), false);
        let response = service
            .chat_completion(
                vec![ChatMessage::user("a")],
                CompletionOptions::new().response_format(lenient),
            )
            .await
            .unwrap();
        assert_eq!(response.content(), Some("plain text"));

        let response = service
            .chat_completion(
                vec![ChatMessage::user("b")],
                CompletionOptions::new().response_format(ResponseFormat::json_object()),
            )
            .await
            .unwrap();
        assert_eq!(response.content(), Some(r#"{"y":1}"#));
    }

    #[tokio::test]
    async fn test_default_response_format_is_enforced() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion(r#"{"y":1}"#));
        let service = service_with(Arc::clone(&transport), |b| {
            b.default_response_format(strict_format())
        });

        let result = service
            .chat_completion(vec![ChatMessage::user("a")], CompletionOptions::new())
            .await;

        assert!(matches!(result, Err(OpenRouterError::Schema { .. })));
    }

    #[test]
    fn test_build_request_prepends_default_system_prompt() {
        let transport = Arc::new(MockTransport::new());
        let service = service_with(transport, |b| {
            b.default_system_prompt("You are terse.")
                .default_param("temperature", 0.7)
                .default_param("max_tokens", 100)
        });

        let request = service.build_request(
            vec![ChatMessage::user("Hi")],
            &CompletionOptions::new().max_tokens(300),
        );

        assert_eq!(
            request.messages,
            vec![
                ChatMessage::system("You are terse."),
                ChatMessage::user("Hi")
            ]
        );
        assert_eq!(request.params["temperature"], 0.7);
        assert_eq!(request.params["max_tokens"], 300);
        assert_eq!(request.model, "openrouter/azure/gpt-4o");
    }

    #[test]
    fn test_build_request_keeps_existing_system_message() {
        let transport = Arc::new(MockTransport::new());
        let service = service_with(transport, |b| b.default_system_prompt("default"));

        let request = service.build_request(
            vec![ChatMessage::system("custom"), ChatMessage::user("Hi")],
            &CompletionOptions::new(),
        );

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, "custom");
    }

    #[tokio::test]
    async fn test_generate_completion_returns_content() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion("42"));
        let service = service_with(Arc::clone(&transport), |b| b);

        let answer = service
            .generate_completion("What is the answer?", CompletionOptions::new())
            .await
            .unwrap();

        assert_eq!(answer, "42");
        let sent = transport.last_request_json().unwrap();
        assert_eq!(sent["messages"], json!([{"role": "user", "content": "What is the answer?"}]));
    }

    #[tokio::test]
    async fn test_generate_completion_rejects_malformed_response() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({"choices": []}));
        let service = service_with(Arc::clone(&transport), |b| b);

        let result = service
            .generate_completion("Hi", CompletionOptions::new())
            .await;

        assert!(matches!(
            result,
            Err(OpenRouterError::UnexpectedResponse { .. })
        ));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            let buf = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_logged_with_masked_key() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = Arc::new(MockTransport::new());
        transport.queue_error(503, "unavailable");
        transport.queue_json(&completion("recovered"));
        let service = service_with(Arc::clone(&transport), |b| b.max_retries(2));

        let response = service
            .chat_completion(
                vec![ChatMessage::user(format!("my key is {}", API_KEY))],
                CompletionOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.content(), Some("recovered"));

        let output = logs.text();
        let attempts: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("openrouter.request"))
            .collect();
        assert_eq!(attempts.len(), 2, "{}", output);
        assert!(attempts[0].contains("status=503"));
        assert!(attempts[1].contains("status=200"));
        assert!(attempts.iter().all(|line| line.contains("duration_ms=")));
        assert!(attempts.iter().all(|line| line.contains("operation=")));

        assert!(output.contains("openrouter.payload"));
        assert!(output.contains("my key is sk-o…2345"));
        assert!(output.contains("Bearer sk-o…2345"));
        assert!(!output.contains(API_KEY));
    }

    #[tokio::test]
    async fn test_non_json_body_is_unexpected_response() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::raw(200, b"<html>oops</html>".to_vec()));
        let service = service_with(Arc::clone(&transport), |b| b);

        let result = service
            .chat_completion(vec![ChatMessage::user("Hi")], CompletionOptions::new())
            .await;

        assert!(matches!(
            result,
            Err(OpenRouterError::UnexpectedResponse { .. })
        ));
    }
}
