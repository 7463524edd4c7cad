//! Tool trait: the abstraction over external capabilities.
//!
//! The engine never sees a tool's internals: only its name, its parameter
//! contract, and an execution entry point. Tools are registered once in a
//! [`ToolRegistry`] and shared read-only across requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ToolError;

/// JSON type of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }
}

/// A named field in a tool's parameter contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (unique within a registry)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// Parameter contract
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    /// Render the parameter contract as a JSON-Schema object.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.ty.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self.required_params().collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Names of the parameters the tool cannot run without.
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    pub fn requires_arguments(&self) -> bool {
        self.params.iter().any(|p| p.required)
    }
}

/// A request to execute a tool, produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID (the model's own ID when it supplied one)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments keyed by parameter name
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with a caller-chosen ID.
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Equality ignoring the call ID.
    pub fn same_request(&self, other: &ToolCall) -> bool {
        self.name == other.name && self.arguments == other.arguments
    }
}

/// Coarse success indicator attached to every tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

/// Appended to a failed result so the model hedges its answer.
pub const LOW_CONFIDENCE_NOTE: &str = "The tool failed to return data. Tell the user you could not \
     verify this information, and begin your answer with \"I'm not certain, but\".";

/// The outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Which tool produced this result
    pub tool_name: String,

    /// The tool's payload, or `{"error": ...}` on failure
    pub payload: Value,

    /// Whether the tool executed successfully
    pub success: bool,

    /// `high` on success, `low` whenever execution raised an error
    pub confidence: Confidence,

    /// Instruction for the model attached to low-confidence results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ToolResult {
    pub fn succeeded(tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload,
            success: true,
            confidence: Confidence::High,
            note: None,
        }
    }

    pub fn failed(tool_name: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload: serde_json::json!({ "error": error.to_string() }),
            success: false,
            confidence: Confidence::Low,
            note: Some(LOW_CONFIDENCE_NOTE.to_string()),
        }
    }

    /// Text placed in the `tool` message for the model.
    pub fn to_message_content(&self) -> String {
        let body = serde_json::json!({
            "tool": self.tool_name,
            "success": self.success,
            "confidence": self.confidence,
            "result": self.payload,
        });
        match &self.note {
            Some(note) => format!("{body}\n\nNOTE: {note}"),
            None => body.to_string(),
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The parameter contract.
    fn params(&self) -> Vec<ParamSpec>;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            params: self.params(),
        }
    }
}

/// An ordered registry of available tools.
///
/// Registration order is the order definitions are presented to the model
/// and the order the phrasal detector scans names in.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its position.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Definition of a single tool.
    pub fn definition(&self, name: &str) -> Option<ToolDefinition> {
        self.get(name).map(|t| t.to_definition())
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// Execute a call and fold any failure into a low-confidence result.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        match self.execute(&call.name, &call.arguments).await {
            Ok(payload) => ToolResult::succeeded(&call.name, payload),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::failed(&call.name, &e)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
