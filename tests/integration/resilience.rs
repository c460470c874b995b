//! Integration tests for retries and rate limiting

use super::*;
use openrouter_client::{ChatMessage, CompletionOptions, OpenRouterError};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_rate_limited_then_success() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(error_response(429, "Rate limit exceeded").insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(success_response("after the limit"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_builder(&mock_server)
        .max_retries(2)
        .backoff_factor(0.0)
        .build()
        .unwrap();

    let response = client
        .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
        .await
        .unwrap();

    assert_eq!(response.content(), Some("after the limit"));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(error_response(503, "Service unavailable"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_builder(&mock_server)
        .max_retries(2)
        .backoff_factor(0.0)
        .build()
        .unwrap();

    let result = client
        .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
        .await;

    match result {
        Err(OpenRouterError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last_error, OpenRouterError::Server { status: 503 }));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(success_response("too late").set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let client = client_builder(&mock_server)
        .timeout(Duration::from_millis(200))
        .max_retries(1)
        .build()
        .unwrap();

    let started = Instant::now();
    let result = client
        .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    match result {
        Err(OpenRouterError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 1);
            assert!(matches!(*last_error, OpenRouterError::Timeout { .. }));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_success_body() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let client = client_builder(&mock_server).build().unwrap();

    let result = client
        .chat_completion(vec![ChatMessage::user("Hey")], CompletionOptions::new())
        .await;

    assert!(matches!(
        result,
        Err(OpenRouterError::UnexpectedResponse { .. })
    ));
}
