//! Provider trait: the abstraction over the language-model service.
//!
//! The engine treats the service as an opaque request/response capability:
//! it sends the conversation plus the tool schema and gets back text and the
//! raw response body. Only the tool detector ever looks inside `raw`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// One invocation of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g. "gpt-4o-mini")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A complete response from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated text (empty when the model only requested tools)
    pub text: String,

    /// The raw response message as the service returned it.
    ///
    /// Structured tool-call fields (`tool_calls`, `function_call`) are read
    /// from here.
    #[serde(default)]
    pub raw: serde_json::Value,

    /// Which model actually responded (may differ from requested)
    #[serde(default)]
    pub model: String,
}

impl ModelResponse {
    /// A plain-text response with no structured payload.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: serde_json::json!({ "role": "assistant", "content": text }),
            text,
            model: String::new(),
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` without knowing which backend is
/// behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g. "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;

    /// Whether the provider is reachable.
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
