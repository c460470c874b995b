//! Chat completion types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Format constraint sent as `response_format`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Format type, e.g. `json_schema` or `json_object`.
    #[serde(rename = "type")]
    pub format_type: String,
    /// Schema definition, used when `format_type` is `json_schema`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaFormat>,
}

/// The `json_schema` member of a response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaFormat {
    /// Schema name reported to the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether output must conform exactly.
    #[serde(default)]
    pub strict: bool,
    /// The JSON schema.
    #[serde(default)]
    pub schema: Value,
}

impl ResponseFormat {
    /// Creates a `json_schema` response format.
    pub fn json_schema(schema: Value, strict: bool) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: Some(JsonSchemaFormat {
                name: None,
                strict,
                schema,
            }),
        }
    }

    /// Creates a `json_object` response format.
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
            json_schema: None,
        }
    }

    /// Sets the schema name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        if let Some(inner) = self.json_schema.as_mut() {
            inner.name = Some(name.into());
        }
        self
    }

    /// Returns the schema to enforce locally, if strict validation applies.
    ///
    /// Validation only applies to `json_schema` formats with `strict` set and
    /// a non-empty schema (`null`, `false` and `{}` count as empty).
    pub fn strict_schema(&self) -> Option<&Value> {
        if self.format_type != "json_schema" {
            return None;
        }
        let inner = self.json_schema.as_ref()?;
        if !inner.strict {
            return None;
        }
        match &inner.schema {
            Value::Null | Value::Bool(false) => None,
            Value::Object(map) if map.is_empty() => None,
            schema => Some(schema),
        }
    }
}

/// Per-call options for a chat completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Extra model parameters, merged over the configured defaults.
    pub model_params: Map<String, Value>,
    /// Response format overriding the configured default.
    pub response_format: Option<ResponseFormat>,
}

impl CompletionOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.model_params.insert(name.into(), value.into());
        self
    }

    /// Sets the temperature.
    pub fn temperature(self, temperature: f64) -> Self {
        self.param("temperature", temperature)
    }

    /// Sets the maximum number of tokens.
    pub fn max_tokens(self, max_tokens: u32) -> Self {
        self.param("max_tokens", max_tokens)
    }

    /// Sets the response format.
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// A fully resolved request, ready to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation, system message first if present.
    pub messages: Vec<ChatMessage>,
    /// Extra parameters; they may override `model`.
    pub params: Map<String, Value>,
    /// Response format in effect.
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    /// Builds the JSON body for `chat/completions`.
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(self.model.clone()));
        payload.insert("messages".to_string(), serde_json::to_value(&self.messages)?);
        for (name, value) in &self.params {
            payload.insert(name.clone(), value.clone());
        }
        if let Some(format) = &self.response_format {
            payload.insert("response_format".to_string(), serde_json::to_value(format)?);
        }
        Ok(Value::Object(payload))
    }
}

/// Parsed response body. Only `choices[0].message.content` is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse(Value);

impl CompletionResponse {
    /// Wraps a parsed body.
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// Returns the assistant content of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.0
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
    }

    /// Returns the full body.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Consumes the response, returning the full body.
    pub fn into_json(self) -> Value {
        self.0
    }
}
