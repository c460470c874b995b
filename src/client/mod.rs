//! OpenRouter API client.
//!
//! Provides the main client interface. A client that owns its transport
//! releases the connection pool on [`OpenRouterClient::close`] or when dropped,
//! so a client held by a cancelled future is still torn down.

use std::sync::Arc;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::config::{OpenRouterConfig, OpenRouterConfigBuilder};
use crate::errors::{OpenRouterError, OpenRouterResult};
use crate::services::{ChatService, ModelsService};
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::chat::{ChatMessage, CompletionOptions, CompletionResponse, ResponseFormat};

/// The main OpenRouter client.
///
/// # Example
///
/// ```rust,no_run
/// use openrouter_client::{ChatMessage, CompletionOptions, OpenRouterClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = OpenRouterClient::builder()
///         .api_key("sk-or-your-key")
///         .build()?;
///
///     let response = client
///         .chat_completion(vec![ChatMessage::user("Hello!")], CompletionOptions::new())
///         .await?;
///     println!("{}", response.content().unwrap_or_default());
///     Ok(())
/// }
/// ```
pub struct OpenRouterClient {
    config: Arc<OpenRouterConfig>,
    transport: Arc<dyn HttpTransport>,
    owns_transport: bool,
    chat_service: ChatService,
    models_service: ModelsService,
}

impl OpenRouterClient {
    /// Creates a new client builder.
    pub fn builder() -> OpenRouterClientBuilder {
        OpenRouterClientBuilder::new()
    }

    /// Creates a client from environment variables.
    pub fn from_env() -> OpenRouterResult<Self> {
        let config = OpenRouterConfig::from_env()?;
        OpenRouterClientBuilder::from_config(config).build()
    }

    /// Creates a client from an API key.
    pub fn from_api_key(api_key: impl Into<String>) -> OpenRouterResult<Self> {
        OpenRouterClientBuilder::new().api_key(api_key).build()
    }

    /// Returns the chat service.
    pub fn chat(&self) -> &ChatService {
        &self.chat_service
    }

    /// Returns the models service.
    pub fn models(&self) -> &ModelsService {
        &self.models_service
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    /// Sends a chat completion request. See [`ChatService::chat_completion`].
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> OpenRouterResult<CompletionResponse> {
        self.chat_service.chat_completion(messages, options).await
    }

    /// Sends a single user prompt. See [`ChatService::generate_completion`].
    pub async fn generate_completion(
        &self,
        prompt: impl Into<String>,
        options: CompletionOptions,
    ) -> OpenRouterResult<String> {
        self.chat_service.generate_completion(prompt, options).await
    }

    /// Blocking health check. See [`ModelsService::health_check`].
    pub fn health_check(&self) -> bool {
        self.models_service.health_check()
    }

    /// Async health check. See [`ModelsService::health_check_async`].
    pub async fn health_check_async(&self) -> bool {
        self.models_service.health_check_async().await
    }

    /// Releases the connection pool. Later requests fail with `Closed`.
    ///
    /// This closes the transport even when it was shared through
    /// [`OpenRouterClientBuilder::transport`].
    pub fn close(&self) {
        self.transport.close();
    }

    /// Returns true once the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}

impl Drop for OpenRouterClient {
    fn drop(&mut self) {
        if self.owns_transport {
            self.transport.close();
        }
    }
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for the OpenRouter client.
pub struct OpenRouterClientBuilder {
    config_builder: OpenRouterConfigBuilder,
    config: Option<OpenRouterConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    owns_transport: bool,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl OpenRouterClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: OpenRouterConfigBuilder::new(),
            config: None,
            transport: None,
            owns_transport: true,
            auth: None,
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: OpenRouterConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::new()
        }
    }

    fn map_config(mut self, f: impl FnOnce(OpenRouterConfigBuilder) -> OpenRouterConfigBuilder) -> Self {
        self.config_builder = f(self.config_builder);
        self
    }

    /// Sets the API key.
    pub fn api_key(self, api_key: impl Into<String>) -> Self {
        self.map_config(|b| b.api_key(api_key))
    }

    /// Names the environment variable consulted for the API key.
    pub fn api_key_env(self, var_name: impl Into<String>) -> Self {
        self.map_config(|b| b.api_key_env(var_name))
    }

    /// Sets the default model.
    pub fn model_name(self, model: impl Into<String>) -> Self {
        self.map_config(|b| b.model_name(model))
    }

    /// Sets the base URL.
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        self.map_config(|b| b.base_url(base_url))
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        self.map_config(|b| b.timeout(timeout))
    }

    /// Sets the maximum number of attempts.
    pub fn max_retries(self, retries: u32) -> Self {
        self.map_config(|b| b.max_retries(retries))
    }

    /// Sets the back-off factor.
    pub fn backoff_factor(self, factor: f64) -> Self {
        self.map_config(|b| b.backoff_factor(factor))
    }

    /// Sets the default system prompt.
    pub fn default_system_prompt(self, prompt: impl Into<String>) -> Self {
        self.map_config(|b| b.default_system_prompt(prompt))
    }

    /// Sets the default response format.
    pub fn default_response_format(self, format: ResponseFormat) -> Self {
        self.map_config(|b| b.default_response_format(format))
    }

    /// Adds a default model parameter.
    pub fn default_param(self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.map_config(|b| b.default_param(name, value))
    }

    /// Sets a shared transport.
    ///
    /// Dropping the client leaves a shared transport open, so other holders
    /// can keep using it. An explicit [`OpenRouterClient::close`] still closes it.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self.owns_transport = false;
        self
    }

    /// Sets a transport that the client takes over and closes when dropped.
    pub fn owned_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self.owns_transport = true;
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Builds the client. Fails before any network activity if the
    /// configuration is incomplete.
    pub fn build(self) -> OpenRouterResult<OpenRouterClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_builder.build()?,
        };
        let config = Arc::new(config);

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                HttpTransportImpl::new(&config.base_url, config.timeout)
                    .map_err(|e| OpenRouterError::configuration(e.to_string()))?,
            ),
        };

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(a) => a,
            None => Arc::new(ApiKeyAuth::from_string(config.api_key())),
        };
        auth.validate()?;

        let chat_service = ChatService::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&auth),
        );
        let models_service = ModelsService::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&auth),
        );

        tracing::debug!(
            model = %config.model_name,
            base_url = %config.base_url,
            timeout_ms = u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
            max_retries = config.max_retries,
            "OpenRouter client initialised"
        );

        Ok(OpenRouterClient {
            config,
            transport,
            owns_transport: self.owns_transport,
            chat_service,
            models_service,
        })
    }
}

impl Default for OpenRouterClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
