//! Per-request state and the pipeline's input and output shapes.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use conductor_agent::loop_runner::{AgentOutcome, ExecutedCall, TerminalState};
use conductor_agent::sanitizer::SanitizeAction;
use conductor_config::EngineConfig;
use conductor_core::message::Message;
use conductor_core::provider::Provider;
use conductor_core::tool::ToolRegistry;
use serde::{Deserialize, Serialize};

/// What a caller hands the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub message: String,
    pub session_id: String,
    /// Prior turns for this session, oldest first
    pub conversation_history: Vec<Message>,
    /// Opaque text from the retrieval collaborator
    pub retrieved_context: Option<String>,
}

impl PipelineInput {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.conversation_history = history;
        self
    }

    pub fn with_retrieved_context(mut self, context: impl Into<String>) -> Self {
        self.retrieved_context = Some(context.into());
        self
    }
}

/// Shared, read-only collaborators. Cheap to clone.
#[derive(Clone)]
pub struct ServiceBindings {
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub config: Arc<EngineConfig>,
}

impl ServiceBindings {
    pub fn new(provider: Arc<dyn Provider>, tools: ToolRegistry, config: EngineConfig) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            config: Arc::new(config),
        }
    }
}

/// How the agent loop went, for callers and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    pub iterations: u32,
    pub model_calls: u32,
    pub tools_used: Vec<String>,
    pub function_calls_executed: Vec<ExecutedCall>,
    pub detection_methods: Vec<String>,
    pub terminal_state: TerminalState,
    pub used_fallback: bool,
    pub sanitizer: SanitizeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentMetadata {
    pub fn from_outcome(outcome: &AgentOutcome, sanitizer: SanitizeAction) -> Self {
        Self {
            iterations: outcome.iterations,
            model_calls: outcome.model_calls,
            tools_used: outcome.tools_used(),
            function_calls_executed: outcome.executed.clone(),
            detection_methods: outcome.detections.clone(),
            terminal_state: outcome.terminal,
            used_fallback: outcome.used_fallback,
            sanitizer,
            error: outcome.error.clone(),
        }
    }
}

/// What the pipeline returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub response: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_length: usize,
    /// Prior history plus this exchange, for the session store
    #[serde(skip)]
    pub conversation_history: Vec<Message>,
    pub model: String,
    pub processing_time_ms: u64,
    pub agent_metadata: AgentMetadata,
}

/// Mutable per-request record. Each step fills in its own artifact.
pub struct ExecutionContext {
    pub input: PipelineInput,
    /// Trimmed message, set by validate_input
    pub validated: Option<String>,
    /// Prompt, history window and user turn, set by prepare_context
    pub messages: Vec<Message>,
    pub outcome: Option<AgentOutcome>,
    /// Final answer text, set by process_response
    pub response: Option<String>,
    pub sanitize_action: Option<SanitizeAction>,
    pub result: Option<FinalResult>,
    started: Instant,
}

impl ExecutionContext {
    pub fn new(input: PipelineInput) -> Self {
        Self {
            input,
            validated: None,
            messages: Vec::new(),
            outcome: None,
            response: None,
            sanitize_action: None,
            result: None,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
