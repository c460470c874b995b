//! Configuration module for the OpenRouter client.
//!
//! The configuration is built once, validated eagerly and never mutated
//! afterwards. A missing API key is a construction-time failure.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::errors::{OpenRouterError, OpenRouterResult};
use crate::types::chat::ResponseFormat;

/// Default base URL for the OpenRouter API.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "openrouter/azure/gpt-4o";

/// Default per-attempt request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of attempts, including the first one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default multiplicative base for the back-off delay.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Value sent in the `X-Title` header.
pub const DEFAULT_APP_TITLE: &str = "OpenRouterService";

/// Configuration for the OpenRouter client.
#[derive(Clone)]
pub struct OpenRouterConfig {
    pub(crate) api_key: SecretString,
    /// Model used when the request does not override it.
    pub model_name: String,
    /// Base URL for API requests, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to each request attempt.
    pub timeout: Duration,
    /// Maximum number of attempts, including the first.
    pub max_retries: u32,
    /// Back-off base: the wait after failed attempt `n` is `factor^(n-1)` seconds.
    pub backoff_factor: f64,
    /// System prompt prepended when the conversation does not start with one.
    pub default_system_prompt: Option<String>,
    /// Response format used when a call does not supply its own.
    pub default_response_format: Option<ResponseFormat>,
    /// Model parameters merged under every call's own parameters.
    pub default_params: Map<String, Value>,
    /// Application title sent as `X-Title`.
    pub app_title: String,
}

impl OpenRouterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OpenRouterConfigBuilder {
        OpenRouterConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENROUTER_API_KEY` (required): API key for authentication
    /// - `OPENROUTER_BASE_URL` (optional): Custom base URL
    /// - `OPENROUTER_MODEL` (optional): Default model
    /// - `OPENROUTER_TIMEOUT` (optional): Request timeout in seconds
    /// - `OPENROUTER_MAX_RETRIES` (optional): Maximum attempts
    /// - `OPENROUTER_BACKOFF_FACTOR` (optional): Back-off base
    pub fn from_env() -> OpenRouterResult<Self> {
        let mut builder = OpenRouterConfigBuilder::new();

        if let Ok(base_url) = std::env::var("OPENROUTER_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            builder = builder.model_name(model);
        }

        if let Ok(timeout_str) = std::env::var("OPENROUTER_TIMEOUT") {
            if let Ok(secs) = timeout_str.parse::<f64>() {
                if let Ok(timeout) = Duration::try_from_secs_f64(secs) {
                    builder = builder.timeout(timeout);
                }
            }
        }

        if let Ok(retries_str) = std::env::var("OPENROUTER_MAX_RETRIES") {
            if let Ok(retries) = retries_str.parse::<u32>() {
                builder = builder.max_retries(retries);
            }
        }

        if let Ok(factor_str) = std::env::var("OPENROUTER_BACKOFF_FACTOR") {
            if let Ok(factor) = factor_str.parse::<f64>() {
                builder = builder.backoff_factor(factor);
            }
        }

        builder.build()
    }

    /// Returns the API key (exposing the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Returns the full URL for an endpoint.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &"[REDACTED]")
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("backoff_factor", &self.backoff_factor)
            .finish_non_exhaustive()
    }
}

/// Builder for `OpenRouterConfig`.
#[derive(Default)]
pub struct OpenRouterConfigBuilder {
    api_key: Option<String>,
    api_key_env: Option<String>,
    model_name: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    backoff_factor: Option<f64>,
    default_system_prompt: Option<String>,
    default_response_format: Option<ResponseFormat>,
    default_params: Map<String, Value>,
    app_title: Option<String>,
}

impl OpenRouterConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Takes precedence over the environment.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Names the environment variable consulted when no key is set explicitly.
    pub fn api_key_env(mut self, var_name: impl Into<String>) -> Self {
        self.api_key_env = Some(var_name.into());
        self
    }

    /// Sets the default model.
    pub fn model_name(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the back-off factor.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    /// Sets the default system prompt.
    pub fn default_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_system_prompt = Some(prompt.into());
        self
    }

    /// Sets the default response format.
    pub fn default_response_format(mut self, format: ResponseFormat) -> Self {
        self.default_response_format = Some(format);
        self
    }

    /// Adds a default model parameter (temperature, max_tokens, ...).
    pub fn default_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_params.insert(name.into(), value.into());
        self
    }

    /// Sets the `X-Title` application name.
    pub fn app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = Some(title.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenRouterResult<OpenRouterConfig> {
        let env_name = self.api_key_env.as_deref().unwrap_or(API_KEY_ENV);
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(env_name).ok().filter(|key| !key.is_empty()))
            .ok_or_else(|| {
                OpenRouterError::configuration(format!(
                    "{} is required but not provided",
                    env_name
                ))
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let parsed = url::Url::parse(&base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OpenRouterError::configuration(
                "Base URL must use http or https",
            ));
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(OpenRouterError::configuration("Timeout must be non-zero"));
        }

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries == 0 {
            return Err(OpenRouterError::configuration(
                "max_retries must allow at least one attempt",
            ));
        }

        let backoff_factor = self.backoff_factor.unwrap_or(DEFAULT_BACKOFF_FACTOR);
        if !backoff_factor.is_finite() || backoff_factor < 0.0 {
            return Err(OpenRouterError::configuration(
                "backoff_factor must be a finite, non-negative number",
            ));
        }

        Ok(OpenRouterConfig {
            api_key: SecretString::new(api_key),
            model_name: self.model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url,
            timeout,
            max_retries,
            backoff_factor,
            default_system_prompt: self.default_system_prompt,
            default_response_format: self.default_response_format,
            default_params: self.default_params,
            app_title: self
                .app_title
                .unwrap_or_else(|| DEFAULT_APP_TITLE.to_string()),
        })
    }
}
