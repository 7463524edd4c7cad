//! The agent loop state machine.

use std::sync::Arc;

use conductor_config::EngineConfig;
use conductor_core::error::ProviderError;
use conductor_core::message::Message;
use conductor_core::provider::{ModelRequest, ModelResponse, Provider};
use conductor_core::tool::{ToolCall, ToolRegistry, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::detector::{Detection, DetectionInput, ToolCallDetector};
use crate::prompt::{
    AUTH_REQUIRED_ANSWER, DEGRADED_ANSWER, MAX_ITERATIONS_ANSWER, followup_instruction, hedge,
};

/// Error text recorded when the iteration cap ends the loop.
pub const MAX_ITERATIONS_ERROR: &str = "Max agent iterations reached";

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// The model produced a final answer
    Finalized,
    /// The cap was hit while the model still asked for tools
    MaxIterationsReached,
    /// Primary and fallback models both failed on the first iteration
    Degraded,
    /// The model service rejected our credentials
    AuthRequired,
}

/// Internal states. Transitions happen only in [`AgentLoop::run`].
enum LoopState {
    AwaitingModel,
    Responded(ModelResponse),
    ToolsDetected(Detection),
    ExecutingTools(Vec<ToolCall>),
    Finalized(String),
    Terminal {
        state: TerminalState,
        answer: &'static str,
        error: String,
    },
}

/// One tool call the loop executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedCall {
    pub name: String,
    pub arguments: Map<String, Value>,
    pub result: ToolResult,
    /// Iteration the call was detected on
    pub iteration: u32,
    /// Cascade method that produced the call
    pub method: String,
    pub duration_ms: u64,
}

/// Everything the loop produced for one request.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub terminal: TerminalState,
    /// Loop passes started
    pub iterations: u32,
    /// Model invocations, fallback included
    pub model_calls: u32,
    /// Model that produced the last response
    pub model: String,
    pub used_fallback: bool,
    /// The full conversation: input messages plus every appended turn
    pub messages: Vec<Message>,
    pub executed: Vec<ExecutedCall>,
    /// Winning detection method per tool-calling iteration
    pub detections: Vec<String>,
    pub error: Option<String>,
}

impl AgentOutcome {
    /// Distinct tool names in first-use order.
    pub fn tools_used(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for call in &self.executed {
            if !names.contains(&call.name) {
                names.push(call.name.clone());
            }
        }
        names
    }

    /// Whether any executed call came back with low confidence.
    pub fn low_confidence(&self) -> bool {
        self.executed.iter().any(|c| !c.result.success)
    }
}

/// Drives the call → detect → execute → append cycle.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    detector: ToolCallDetector,
    model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    max_iterations: u32,
}

impl AgentLoop {
    /// Create a loop with the default cascade and no fallback model.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            detector: ToolCallDetector::default(),
            model: model.into(),
            fallback_model: None,
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            max_iterations: 5,
        }
    }

    /// Models, sampling, iteration cap and auto-trigger policy from config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &EngineConfig,
    ) -> Self {
        let model = &config.model;
        Self::new(provider, tools, &model.primary)
            .with_fallback_model(&model.fallback)
            .with_sampling(model.max_tokens, model.temperature, model.top_p)
            .with_max_iterations(config.agent.max_iterations)
            .with_detector(ToolCallDetector::new(&config.auto_trigger))
    }

    /// Set the model retried once when the first call fails. An empty name
    /// or the primary model itself disables the fallback.
    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.fallback_model = (!model.is_empty() && model != self.model).then_some(model);
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32, top_p: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    /// Set the maximum number of model invocations per request.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_detector(mut self, detector: ToolCallDetector) -> Self {
        self.detector = detector;
        self
    }

    async fn call_model(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Result<ModelResponse, ProviderError> {
        let request = ModelRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            tools: self.tools.definitions(),
        };
        let mut response = self.provider.complete(request).await?;
        if response.model.is_empty() {
            response.model = model.to_string();
        }
        Ok(response)
    }

    /// Run the loop over a prepared conversation.
    ///
    /// `messages` must already hold the system prompt and the latest user
    /// turn. `user_message` is the end user's own text, which auto-trigger
    /// and argument templates read.
    ///
    /// Model failures after the first iteration are returned as errors;
    /// everything else ends in an [`AgentOutcome`].
    pub async fn run(
        &self,
        messages: Vec<Message>,
        user_message: &str,
    ) -> Result<AgentOutcome, ProviderError> {
        let mut messages = messages;
        let mut iteration = 0u32;
        let mut model_calls = 0u32;
        let mut model_used = self.model.clone();
        let mut used_fallback = false;
        let mut executed: Vec<ExecutedCall> = Vec::new();
        let mut answered: Vec<ToolCall> = Vec::new();
        let mut detections: Vec<String> = Vec::new();

        info!(
            model = %self.model,
            messages = messages.len(),
            tools = self.tools.len(),
            "Starting agent loop"
        );

        let mut state = LoopState::AwaitingModel;
        let (answer, terminal, error) = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if model_calls >= self.max_iterations {
                        warn!(iterations = iteration, "Max agent iterations reached");
                        LoopState::Terminal {
                            state: TerminalState::MaxIterationsReached,
                            answer: MAX_ITERATIONS_ANSWER,
                            error: MAX_ITERATIONS_ERROR.to_string(),
                        }
                    } else {
                        iteration += 1;
                        debug!(iteration, "Agent loop iteration");
                        model_calls += 1;
                        match self.call_model(&messages, &self.model).await {
                            Ok(response) => {
                                model_used = response.model.clone();
                                LoopState::Responded(response)
                            }
                            Err(e) if e.is_auth_failure() => auth_required(e),
                            Err(e) if iteration == 1 => {
                                match self.fallback_model.as_deref() {
                                    Some(fallback) if model_calls < self.max_iterations => {
                                        warn!(
                                            error = %e,
                                            fallback,
                                            "Primary model failed, retrying with fallback"
                                        );
                                        model_calls += 1;
                                        match self.call_model(&messages, fallback).await {
                                            Ok(response) => {
                                                used_fallback = true;
                                                model_used = response.model.clone();
                                                LoopState::Responded(response)
                                            }
                                            Err(e) if e.is_auth_failure() => auth_required(e),
                                            Err(e) => degraded(e),
                                        }
                                    }
                                    _ => degraded(e),
                                }
                            }
                            Err(e) => {
                                warn!(iteration, error = %e, "Model call failed");
                                return Err(e);
                            }
                        }
                    }
                }

                LoopState::Responded(response) => {
                    let detection = self.detector.detect(&DetectionInput {
                        response: &response,
                        user_message,
                        registry: &self.tools,
                        iteration,
                    });
                    match detection {
                        Some(mut detection) => {
                            // A call repeating one already answered means the
                            // model is restating, not asking.
                            detection
                                .calls
                                .retain(|call| !answered.iter().any(|done| done.same_request(call)));
                            if detection.calls.is_empty() {
                                debug!(iteration, "Only repeated calls detected, finalizing");
                                LoopState::Finalized(response.text)
                            } else {
                                LoopState::ToolsDetected(detection)
                            }
                        }
                        None => LoopState::Finalized(response.text),
                    }
                }

                LoopState::ToolsDetected(detection) => {
                    detections.push(detection.method.to_string());
                    messages.push(Message::assistant_tool_calls(detection.calls.clone()));
                    LoopState::ExecutingTools(detection.calls)
                }

                LoopState::ExecutingTools(calls) => {
                    let method = detections.last().cloned().unwrap_or_default();
                    for call in &calls {
                        let start = std::time::Instant::now();
                        let result = self.tools.invoke(call).await;
                        let duration_ms = start.elapsed().as_millis() as u64;
                        debug!(
                            tool = %call.name,
                            success = result.success,
                            duration_ms,
                            "Tool executed"
                        );
                        messages.push(Message::tool_result(call, result.to_message_content()));
                        executed.push(ExecutedCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                            result,
                            iteration,
                            method: method.clone(),
                            duration_ms,
                        });
                        answered.push(call.clone());
                    }
                    let hedged = executed.iter().any(|c| !c.result.success);
                    messages.push(Message::user(followup_instruction(hedged)));
                    LoopState::AwaitingModel
                }

                LoopState::Finalized(text) => break (text, TerminalState::Finalized, None),

                LoopState::Terminal {
                    state,
                    answer,
                    error,
                } => break (answer.to_string(), state, Some(error)),
            };
        };

        let low_confidence = executed.iter().any(|c| !c.result.success);
        let answer = if low_confidence && terminal == TerminalState::Finalized {
            hedge(&answer)
        } else {
            answer
        };
        messages.push(Message::assistant(&answer));

        info!(
            iterations = iteration,
            model_calls,
            tools = executed.len(),
            terminal = ?terminal,
            "Agent loop finished"
        );

        Ok(AgentOutcome {
            answer,
            terminal,
            iterations: iteration,
            model_calls,
            model: model_used,
            used_fallback,
            messages,
            executed,
            detections,
            error,
        })
    }
}

fn auth_required(error: ProviderError) -> LoopState {
    warn!(error = %error, "Model service rejected credentials");
    LoopState::Terminal {
        state: TerminalState::AuthRequired,
        answer: AUTH_REQUIRED_ANSWER,
        error: error.to_string(),
    }
}

fn degraded(error: ProviderError) -> LoopState {
    warn!(error = %error, "Model unavailable, returning degraded answer");
    LoopState::Terminal {
        state: TerminalState::Degraded,
        answer: DEGRADED_ANSWER,
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        SequentialMockProvider, native_call_response, registry, registry_with_failing,
    };
    use conductor_core::message::Role;

    fn agent(provider: Arc<SequentialMockProvider>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(provider, Arc::new(tools), "primary-model").with_fallback_model("fallback-model")
    }

    fn conversation(user: &str) -> Vec<Message> {
        vec![Message::system("You are a test assistant."), Message::user(user)]
    }

    #[tokio::test]
    async fn direct_answer_finalizes_after_one_call() {
        let provider = Arc::new(SequentialMockProvider::single_text("Paris."));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("Capital of France?"), "Capital of France?")
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalState::Finalized);
        assert_eq!(outcome.answer, "Paris.");
        assert_eq!(outcome.model_calls, 1);
        assert!(outcome.executed.is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let provider = Arc::new(SequentialMockProvider::responses(vec![
            native_call_response("calculate", serde_json::json!({"expression": "12 * 7"})),
            ModelResponse::text("12 times 7 is 84."),
        ]));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("Calculate 12 * 7"), "Calculate 12 * 7")
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalState::Finalized);
        assert_eq!(outcome.tools_used(), vec!["calculate"]);
        assert_eq!(outcome.executed[0].result.payload["result"], 84);
        assert_eq!(outcome.detections, vec!["native"]);
        assert!(outcome.answer.contains("84"));

        // The second request is the first plus the call turn, the result,
        // and the follow-up instruction, in that order.
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let first = &requests[0].messages;
        let second = &requests[1].messages;
        assert_eq!(&second[..first.len()], &first[..]);
        let appended: Vec<Role> = second[first.len()..].iter().map(|m| m.role).collect();
        assert_eq!(appended, vec![Role::Assistant, Role::Tool, Role::User]);
        assert!(second[first.len()].content.is_empty());
        assert_eq!(second[first.len()].tool_calls.len(), 1);
        assert!(!requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn parallel_calls_append_results_in_call_order() {
        let both = ModelResponse {
            text: String::new(),
            raw: serde_json::json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {
                        "id": "call_a",
                        "type": "function",
                        "function": { "name": "calculate", "arguments": "{\"expression\": \"12 * 7\"}" }
                    },
                    {
                        "id": "call_b",
                        "type": "function",
                        "function": {
                            "name": "convert_currency",
                            "arguments": "{\"amount\": 10, \"from\": \"USD\", \"to\": \"EUR\"}"
                        }
                    }
                ]
            }),
            model: "mock-model".into(),
        };
        let provider = Arc::new(SequentialMockProvider::responses(vec![
            both,
            ModelResponse::text("84, and 10 USD is about 9.20 EUR."),
        ]));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("Two quick sums please"), "Two quick sums please")
            .await
            .unwrap();

        assert_eq!(outcome.tools_used(), vec!["calculate", "convert_currency"]);
        assert_eq!(outcome.detections, vec!["native"]);

        let requests = provider.requests();
        let first = &requests[0].messages;
        let appended = &requests[1].messages[first.len()..];
        let roles: Vec<Role> = appended.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::Tool, Role::Tool, Role::User]);

        let call_ids: Vec<&str> = appended[0].tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(call_ids, vec!["call_a", "call_b"]);
        assert_eq!(appended[1].tool_name.as_deref(), Some("calculate"));
        assert_eq!(appended[2].tool_name.as_deref(), Some("convert_currency"));
    }

    #[tokio::test]
    async fn failing_tool_yields_hedged_answer() {
        let provider = Arc::new(SequentialMockProvider::responses(vec![
            ModelResponse::text("Checking."),
            ModelResponse::text("It is sunny in Tokyo."),
        ]));
        let outcome = agent(provider.clone(), registry_with_failing("get_weather"))
            .run(
                conversation("What's the weather in Tokyo today?"),
                "What's the weather in Tokyo today?",
            )
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalState::Finalized);
        assert!(!outcome.executed[0].result.success);
        assert_eq!(outcome.executed[0].method, "auto_trigger");
        assert!(outcome.low_confidence());
        assert_eq!(outcome.answer, "I'm not certain, but it is sunny in Tokyo.");

        let second = &provider.requests()[1].messages;
        assert!(second.last().unwrap().content.contains("I'm not certain, but"));
    }

    #[tokio::test]
    async fn iteration_cap_degrades_answer() {
        let responses = (0..5)
            .map(|i| {
                native_call_response("calculate", serde_json::json!({"expression": format!("{i} + 1")}))
            })
            .collect();
        let provider = Arc::new(SequentialMockProvider::responses(responses));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("count"), "count")
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalState::MaxIterationsReached);
        assert_eq!(outcome.error.as_deref(), Some(MAX_ITERATIONS_ERROR));
        assert_eq!(outcome.answer, MAX_ITERATIONS_ANSWER);
        assert_eq!(outcome.model_calls, 5);
        assert_eq!(provider.call_count(), 5);
    }

    #[tokio::test]
    async fn repeated_call_is_treated_as_final() {
        let provider = Arc::new(SequentialMockProvider::responses(vec![
            native_call_response("calculate", serde_json::json!({"expression": "2 + 2"})),
            native_call_response("calculate", serde_json::json!({"expression": "2 + 2"})),
        ]));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("2 + 2?"), "2 + 2?")
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalState::Finalized);
        assert_eq!(outcome.executed.len(), 1);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn first_call_failure_uses_fallback() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Err(ProviderError::Network("connection reset".into())),
            Ok(ModelResponse::text("Hello from the fallback.")),
        ]));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("hi"), "hi")
            .await
            .unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(outcome.model, "fallback-model");
        assert_eq!(outcome.model_calls, 2);
        let requests = provider.requests();
        assert_eq!(requests[0].model, "primary-model");
        assert_eq!(requests[1].model, "fallback-model");
    }

    #[tokio::test]
    async fn fallback_failure_degrades() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Err(ProviderError::Timeout("primary".into())),
            Err(ProviderError::Network("fallback".into())),
        ]));
        let outcome = agent(provider, registry()).run(conversation("hi"), "hi").await.unwrap();

        assert_eq!(outcome.terminal, TerminalState::Degraded);
        assert_eq!(outcome.answer, DEGRADED_ANSWER);
        assert!(outcome.error.unwrap().contains("fallback"));
    }

    #[tokio::test]
    async fn auth_failure_short_circuits() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("Invalid API key".into()),
        )]));
        let outcome = agent(provider.clone(), registry())
            .run(conversation("hi"), "hi")
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalState::AuthRequired);
        assert_eq!(outcome.answer, AUTH_REQUIRED_ANSWER);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn later_failure_propagates() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(native_call_response("calculate", serde_json::json!({"expression": "1 + 1"}))),
            Err(ProviderError::Network("down".into())),
        ]));
        let err = agent(provider, registry())
            .run(conversation("1 + 1"), "1 + 1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
