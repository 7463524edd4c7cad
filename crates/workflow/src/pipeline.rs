//! Pipeline coordinator: five fixed steps under one deadline.
//!
//! ```text
//! validate_input → prepare_context → run_agent_loop → process_response → finalize_state
//! ```
//!
//! Each step goes through the [`StepRunner`] with its own attempt budget.
//! A step that exhausts its budget aborts the request. Persistence is left
//! to the caller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use conductor_agent::loop_runner::{AgentLoop, TerminalState};
use conductor_agent::prompt::{hedge, merge_retrieved_context, system_prompt};
use conductor_agent::sanitizer::{ResponseSanitizer, SanitizeAction};
use conductor_config::PipelineConfig;
use conductor_core::message::Message;
use tracing::{debug, info, warn};

use crate::context::{
    AgentMetadata, ExecutionContext, FinalResult, PipelineInput, ServiceBindings,
};
use crate::error::EngineError;
use crate::step::{Step, StepHandler, StepRunner};

/// Returned when the model's answer is empty after processing.
pub const EMPTY_ANSWER: &str =
    "I don't have an answer for that yet. Could you try rephrasing your question?";

pub struct Pipeline {
    runner: StepRunner,
    steps: Vec<Step>,
    deadline: Duration,
}

impl Pipeline {
    /// The standard five steps with attempts, backoff and deadline from
    /// config.
    pub fn new(config: &PipelineConfig) -> Self {
        let attempts = &config.attempts;
        Self {
            runner: StepRunner::new(Duration::from_secs(config.backoff_base_secs)),
            steps: vec![
                Step::new("validate_input", attempts.validate_input, Box::new(ValidateInput)),
                Step::new("prepare_context", attempts.prepare_context, Box::new(PrepareContext)),
                Step::new("run_agent_loop", attempts.run_agent_loop, Box::new(RunAgentLoop)),
                Step::new("process_response", attempts.process_response, Box::new(ProcessResponse)),
                Step::new("finalize_state", attempts.finalize_state, Box::new(FinalizeState)),
            ],
            deadline: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Run one request end to end.
    pub async fn execute(
        &self,
        input: PipelineInput,
        services: &ServiceBindings,
    ) -> Result<FinalResult, EngineError> {
        let session_id = input.session_id.clone();
        info!(session_id = %session_id, chars = input.message.len(), "Pipeline started");

        match tokio::time::timeout(self.deadline, self.run_steps(input, services)).await {
            Ok(Ok(result)) => {
                info!(
                    session_id = %session_id,
                    processing_time_ms = result.processing_time_ms,
                    tools = ?result.agent_metadata.tools_used,
                    "Pipeline finished"
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Pipeline failed");
                Err(e)
            }
            Err(_) => {
                let secs = self.deadline.as_secs();
                warn!(session_id = %session_id, secs, "Pipeline deadline expired");
                Err(EngineError::Timeout { secs })
            }
        }
    }

    async fn run_steps(
        &self,
        input: PipelineInput,
        services: &ServiceBindings,
    ) -> Result<FinalResult, EngineError> {
        let mut ctx = ExecutionContext::new(input);
        for step in &self.steps {
            self.runner.run(step, &mut ctx, services).await?;
        }
        ctx.result
            .take()
            .ok_or_else(|| EngineError::Internal("pipeline finished without a result".into()))
    }
}

fn missing(artifact: &str) -> EngineError {
    EngineError::Internal(format!("{artifact} missing from execution context"))
}

// ── Steps ───────────────────────────────────────────────────────────────────

struct ValidateInput;

#[async_trait]
impl StepHandler for ValidateInput {
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        services: &ServiceBindings,
    ) -> Result<(), EngineError> {
        let message = ctx.input.message.trim();
        if message.is_empty() {
            return Err(EngineError::Validation("Message must not be empty".into()));
        }
        let limit = services.config.pipeline.max_message_chars;
        let chars = message.chars().count();
        if chars > limit {
            return Err(EngineError::Validation(format!(
                "Message is {chars} characters long; the limit is {limit}"
            )));
        }
        if ctx.input.session_id.trim().is_empty() {
            return Err(EngineError::Validation("Session id must not be empty".into()));
        }
        ctx.validated = Some(message.to_string());
        Ok(())
    }
}

struct PrepareContext;

#[async_trait]
impl StepHandler for PrepareContext {
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        services: &ServiceBindings,
    ) -> Result<(), EngineError> {
        let message = ctx.validated.as_deref().ok_or_else(|| missing("validated message"))?;
        let window = services.config.pipeline.history_window;

        let dialogue: Vec<&Message> = ctx
            .input
            .conversation_history
            .iter()
            .filter(|m| m.is_dialogue())
            .collect();
        let skip = dialogue.len().saturating_sub(window);

        let mut messages = Vec::with_capacity(window + 2);
        messages.push(Message::system(system_prompt(
            &services.tools.definitions(),
            Utc::now().date_naive(),
        )));
        messages.extend(dialogue.into_iter().skip(skip).cloned());
        messages.push(Message::user(merge_retrieved_context(
            message,
            ctx.input.retrieved_context.as_deref(),
        )));

        debug!(messages = messages.len(), "Context prepared");
        ctx.messages = messages;
        Ok(())
    }
}

struct RunAgentLoop;

#[async_trait]
impl StepHandler for RunAgentLoop {
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        services: &ServiceBindings,
    ) -> Result<(), EngineError> {
        let message = ctx.validated.as_deref().ok_or_else(|| missing("validated message"))?;
        let agent = AgentLoop::from_config(
            services.provider.clone(),
            services.tools.clone(),
            &services.config,
        );
        let outcome = agent.run(ctx.messages.clone(), message).await?;
        ctx.outcome = Some(outcome);
        Ok(())
    }
}

struct ProcessResponse;

#[async_trait]
impl StepHandler for ProcessResponse {
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        services: &ServiceBindings,
    ) -> Result<(), EngineError> {
        let outcome = ctx.outcome.as_ref().ok_or_else(|| missing("agent outcome"))?;

        // Fixed terminal answers are ours; only model text is sanitized.
        let (text, action) = if outcome.terminal == TerminalState::Finalized {
            let sanitized = ResponseSanitizer::new(&services.config.sanitizer).sanitize(&outcome.answer);
            (sanitized.text, sanitized.action)
        } else {
            (outcome.answer.clone(), SanitizeAction::Unchanged)
        };

        let mut text = text.trim().to_string();
        if text.is_empty() {
            text = EMPTY_ANSWER.to_string();
        } else if outcome.low_confidence()
            && outcome.terminal == TerminalState::Finalized
            && action != SanitizeAction::Replaced
        {
            text = hedge(&text);
        }

        ctx.response = Some(truncate_chars(&text, services.config.pipeline.max_response_chars));
        ctx.sanitize_action = Some(action);
        Ok(())
    }
}

struct FinalizeState;

#[async_trait]
impl StepHandler for FinalizeState {
    async fn handle(
        &self,
        ctx: &mut ExecutionContext,
        _services: &ServiceBindings,
    ) -> Result<(), EngineError> {
        let message = ctx.validated.clone().ok_or_else(|| missing("validated message"))?;
        let response = ctx.response.clone().ok_or_else(|| missing("response"))?;
        let outcome = ctx.outcome.as_ref().ok_or_else(|| missing("agent outcome"))?;
        let action = ctx.sanitize_action.unwrap_or(SanitizeAction::Unchanged);

        let mut history = ctx.input.conversation_history.clone();
        history.push(Message::user(message));
        history.push(Message::assistant(&response));

        let result = FinalResult {
            response,
            session_id: ctx.input.session_id.clone(),
            timestamp: Utc::now(),
            conversation_length: history.len(),
            conversation_history: history,
            model: outcome.model.clone(),
            processing_time_ms: ctx.elapsed_ms(),
            agent_metadata: AgentMetadata::from_outcome(outcome, action),
        };
        ctx.result = Some(result);
        Ok(())
    }
}

/// Cut to at most `max` chars, ending in an ellipsis when cut.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}
