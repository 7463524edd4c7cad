//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use conductor_core::error::{ProviderError, ToolError};
use conductor_core::provider::{ModelRequest, ModelResponse, Provider};
use conductor_core::tool::{ParamSpec, ParamType, Tool, ToolRegistry};
use serde_json::{Map, Value};

/// The built-in tools.
pub fn registry() -> ToolRegistry {
    conductor_tools::default_registry()
}

/// Built-in tools with `name` swapped for one that always fails.
pub fn registry_with_failing(name: &str) -> ToolRegistry {
    let mut reg = registry();
    reg.register(Box::new(FailingTool::new(name)));
    reg
}

/// A response carrying one native `tool_calls` entry.
pub fn native_call_response(name: &str, args: Value) -> ModelResponse {
    ModelResponse {
        text: String::new(),
        raw: serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": format!("call_{name}"),
                "type": "function",
                "function": { "name": name, "arguments": args.to_string() }
            }]
        }),
        model: "mock-model".into(),
    }
}

/// A mock provider that replays a script of responses and errors.
///
/// Each call to `complete` takes the next entry. Panics if more calls are
/// made than entries provided.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl SequentialMockProvider {
    pub fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responses(responses: Vec<ModelResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn single_text(text: &str) -> Self {
        Self::responses(vec![ModelResponse::text(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut response)) => {
                if response.model.is_empty() {
                    response.model = requests[requests.len() - 1].model.clone();
                }
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{})",
                requests.len()
            ),
        }
    }
}

/// A tool that always fails, registered under any name.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("location", ParamType::String, "Anything")]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: "upstream service unavailable".into(),
        })
    }
}
