//! Authentication module for the OpenRouter client.
//!
//! Provides bearer-token authentication and the masking used whenever a
//! payload or header map is written to the logs.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::errors::OpenRouterError;

/// Authentication provider trait.
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;

    /// Validate the credentials.
    fn validate(&self) -> Result<(), OpenRouterError>;
}

/// API key authentication provider.
///
/// Uses Bearer token authentication with the OpenRouter API key.
pub struct ApiKeyAuth {
    api_key: SecretString,
}

impl ApiKeyAuth {
    /// Creates a new API key authentication provider.
    pub fn new(api_key: SecretString) -> Self {
        Self { api_key }
    }

    /// Creates from a string API key.
    pub fn from_string(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
        }
    }

    /// Returns a masker for this key.
    pub fn masker(&self) -> SecretMasker {
        SecretMasker::new(self.api_key.expose_secret())
    }
}

impl AuthProvider for ApiKeyAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key.expose_secret()),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> Result<(), OpenRouterError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(OpenRouterError::configuration("API key cannot be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("api_key", &self.masker().hint())
            .finish()
    }
}

/// Replaces every occurrence of a secret with a `first4…last4` hint.
///
/// Secrets shorter than 8 characters are replaced by `****` instead, since a
/// `first4…last4` hint would reveal all or most of them.
#[derive(Clone)]
pub struct SecretMasker {
    secret: SecretString,
    hint: String,
}

impl SecretMasker {
    /// Creates a masker for the given secret.
    pub fn new(secret: &str) -> Self {
        let chars: Vec<char> = secret.chars().collect();
        // Keys under 8 chars get no partial hint.
        let hint = if chars.len() < 8 {
            "****".to_string()
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}…{}", head, tail)
        };

        Self {
            secret: SecretString::new(secret.to_string()),
            hint,
        }
    }

    /// The replacement written in place of the secret.
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Masks a string.
    pub fn mask_str(&self, text: &str) -> String {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return text.to_string();
        }
        text.replace(secret.as_str(), &self.hint)
    }

    /// Masks every string and object key of a JSON value.
    pub fn mask_json(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.mask_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.mask_json(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.mask_str(k), self.mask_json(v)))
                    .collect::<Map<String, Value>>(),
            ),
            other => other.clone(),
        }
    }

    /// Masks header values.
    pub fn mask_headers(&self, headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(k, v)| (k.clone(), self.mask_str(v)))
            .collect()
    }
}

impl std::fmt::Debug for SecretMasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMasker")
            .field("hint", &self.hint)
            .finish()
    }
}
