//! Models endpoint and health checks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthProvider;
use crate::config::OpenRouterConfig;
use crate::transport::{HttpRequest, HttpTransport};

/// Timeout used by both health checks.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Models service.
pub struct ModelsService {
    config: Arc<OpenRouterConfig>,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
}

impl ModelsService {
    /// Creates a new models service.
    pub fn new(
        config: Arc<OpenRouterConfig>,
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            config,
            transport,
            auth,
        }
    }

    fn auth_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        self.auth.apply_auth(&mut headers);
        headers
    }

    /// Blocking health check against `GET {base_url}/models`.
    ///
    /// Meant for process start-up, before an async runtime exists. When called
    /// from inside a runtime the request runs on a dedicated thread, since the
    /// blocking client cannot be dropped on a runtime thread. Returns true only
    /// on HTTP 200 and never fails.
    pub fn health_check(&self) -> bool {
        let url = self.config.endpoint_url("models");
        let headers = self.auth_headers();

        if tokio::runtime::Handle::try_current().is_err() {
            return blocking_health_check(&url, headers);
        }

        std::thread::spawn(move || blocking_health_check(&url, headers))
            .join()
            .unwrap_or_else(|_| {
                tracing::warn!("Health check thread panicked");
                false
            })
    }

    /// Same contract as [`health_check`](Self::health_check), issued through
    /// the client's transport for callers already running async code.
    pub async fn health_check_async(&self) -> bool {
        let request = HttpRequest {
            headers: self.auth_headers(),
            ..HttpRequest::get("models").with_timeout(HEALTH_CHECK_TIMEOUT)
        };

        match self.transport.send(request).await {
            Ok(response) => response.status == 200,
            Err(err) => {
                tracing::debug!(error = %err, "Health check failed");
                false
            }
        }
    }
}

fn blocking_health_check(url: &str, headers: HashMap<String, String>) -> bool {
    let client = match reqwest::blocking::Client::builder()
        .timeout(HEALTH_CHECK_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to build health check client");
            return false;
        }
    };

    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(name, value);
    }

    match request.send() {
        Ok(response) => response.status().as_u16() == 200,
        Err(err) => {
            tracing::debug!(error = %err, "Health check failed");
            false
        }
    }
}

impl std::fmt::Debug for ModelsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelsService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyAuth;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::transport::{HttpMethod, TransportError};
    use serde_json::json;

    fn service(transport: Arc<MockTransport>) -> ModelsService {
        let config = OpenRouterConfig::builder()
            .api_key("sk-or-test-key")
            .build()
            .unwrap();
        ModelsService::new(
            Arc::new(config),
            transport,
            Arc::new(ApiKeyAuth::from_string("sk-or-test-key")),
        )
    }

    #[test]
    fn test_blocking_health_check_unreachable_is_false() {
        let config = OpenRouterConfig::builder()
            .api_key("sk-or-test-key")
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let service = ModelsService::new(
            Arc::new(config),
            Arc::new(MockTransport::new()),
            Arc::new(ApiKeyAuth::from_string("sk-or-test-key")),
        );

        assert!(!service.health_check());
    }

    #[tokio::test]
    async fn test_blocking_health_check_inside_runtime_does_not_panic() {
        let config = OpenRouterConfig::builder()
            .api_key("sk-or-test-key")
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let service = ModelsService::new(
            Arc::new(config),
            Arc::new(MockTransport::new()),
            Arc::new(ApiKeyAuth::from_string("sk-or-test-key")),
        );

        assert!(!service.health_check());
    }

    #[tokio::test]
    async fn test_health_check_async_ok() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({"data": []}));

        assert!(service(Arc::clone(&transport)).health_check_async().await);

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "models");
        assert_eq!(request.timeout, Some(HEALTH_CHECK_TIMEOUT));
        assert!(request.headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn test_health_check_async_non_200_is_false() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(503, "down"));
        assert!(!service(transport).health_check_async().await);
    }

    #[tokio::test]
    async fn test_health_check_async_network_error_is_false() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_transport_error(TransportError::Connection {
            message: "refused".to_string(),
        });
        assert!(!service(transport).health_check_async().await);
    }
}
