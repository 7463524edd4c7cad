//! Shared test helpers for workflow tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conductor_config::EngineConfig;
use conductor_core::error::ProviderError;
use conductor_core::provider::{ModelRequest, ModelResponse, Provider};
use serde_json::Value;

use crate::context::ServiceBindings;

/// Bindings with default config, the built-in tools and a scripted model.
pub fn services(script: Vec<Result<ModelResponse, ProviderError>>) -> ServiceBindings {
    services_with(EngineConfig::default(), script)
}

pub fn services_with(
    config: EngineConfig,
    script: Vec<Result<ModelResponse, ProviderError>>,
) -> ServiceBindings {
    ServiceBindings::new(
        Arc::new(ScriptedProvider::new(script)),
        conductor_tools::default_registry(),
        config,
    )
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

/// Replays a script of responses and errors, one per call. Panics when the
/// script runs out.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut response)) => {
                if response.model.is_empty() {
                    response.model = request.model;
                }
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => panic!("ScriptedProvider: script exhausted"),
        }
    }
}

/// Answers after sleeping for the given duration.
pub struct SlowProvider(pub Duration);

#[async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(ModelResponse {
            model: request.model,
            ..ModelResponse::text("finally")
        })
    }
}
