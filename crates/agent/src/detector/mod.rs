//! Tool-call detection: recovering call intent from model output.
//!
//! Detection is a strict priority cascade of [`DetectionMethod`]s. The first
//! method returning a non-empty list wins and the rest are never consulted,
//! so exactly one method's result is used per iteration.
//!
//! Default order:
//!
//! | method | source |
//! |--------|--------|
//! | [`AutoTrigger`] | the user's message (first iteration only) |
//! | [`NativeToolCalls`] | `tool_calls` on the raw response |
//! | [`LegacyFunctionCall`] | `function_call` on the raw response |
//! | [`EmbeddedJson`] | JSON objects inside the text |
//! | [`BracketMarker`] | `[FUNCTION_CALL: name(args)]` markers |
//! | [`PhrasalIntent`] | "I will use X", "X(", "using X", "need X" |
//!
//! Auto-trigger runs ahead of the structured methods on purpose: when the
//! user's message falls in a forced category, what the model said on that
//! turn is discarded.
//!
//! Every method is pure: running the detector twice over the same input
//! yields the same calls, IDs included.

mod auto_trigger;
mod bracket;
mod embedded_json;
pub mod extract;
mod phrasal;
mod structured;

pub use auto_trigger::{AutoTrigger, is_current_info_query, is_weather_query};
pub use bracket::BracketMarker;
pub use embedded_json::EmbeddedJson;
pub use phrasal::PhrasalIntent;
pub use structured::{LegacyFunctionCall, NativeToolCalls};

use conductor_config::AutoTriggerConfig;
use conductor_core::provider::ModelResponse;
use conductor_core::tool::{ToolCall, ToolRegistry};
use tracing::debug;

/// Everything a detection method may look at.
pub struct DetectionInput<'a> {
    /// The model's response for this iteration
    pub response: &'a ModelResponse,

    /// The end user's original message (not the engine's follow-up turns)
    pub user_message: &'a str,

    /// Registered tools; textual methods only accept names found here
    pub registry: &'a ToolRegistry,

    /// 1-based agent loop iteration
    pub iteration: u32,
}

impl DetectionInput<'_> {
    /// Id for the `n`th call a method synthesizes on this iteration.
    pub fn call_id(&self, prefix: &str, n: usize) -> String {
        format!("call_{prefix}_{}_{n}", self.iteration)
    }
}

/// One way of recognizing tool-call intent.
pub trait DetectionMethod: Send + Sync {
    /// Stable identifier, recorded in agent metadata.
    fn name(&self) -> &'static str;

    /// Calls found by this method, or an empty list.
    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall>;
}

/// The winning method and its calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub method: &'static str,
    pub calls: Vec<ToolCall>,
}

/// Runs detection methods in priority order.
pub struct ToolCallDetector {
    methods: Vec<Box<dyn DetectionMethod>>,
}

impl ToolCallDetector {
    /// The full cascade with the given auto-trigger policy.
    pub fn new(policy: &AutoTriggerConfig) -> Self {
        Self::with_methods(vec![
            Box::new(AutoTrigger::new(policy.clone())),
            Box::new(NativeToolCalls),
            Box::new(LegacyFunctionCall),
            Box::new(EmbeddedJson),
            Box::new(BracketMarker),
            Box::new(PhrasalIntent),
        ])
    }

    /// Only the structured methods, for services whose native function
    /// calling is reliable enough that text heuristics would only add
    /// false positives.
    pub fn structured_only() -> Self {
        Self::with_methods(vec![Box::new(NativeToolCalls), Box::new(LegacyFunctionCall)])
    }

    /// A custom cascade, evaluated in the order given.
    pub fn with_methods(methods: Vec<Box<dyn DetectionMethod>>) -> Self {
        Self { methods }
    }

    /// Method names in evaluation order.
    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    /// Run the cascade. `None` means the response is a final answer.
    pub fn detect(&self, input: &DetectionInput<'_>) -> Option<Detection> {
        for method in &self.methods {
            let calls = method.detect(input);
            if !calls.is_empty() {
                debug!(
                    method = method.name(),
                    calls = calls.len(),
                    iteration = input.iteration,
                    "Tool calls detected"
                );
                return Some(Detection {
                    method: method.name(),
                    calls,
                });
            }
        }
        None
    }
}

impl Default for ToolCallDetector {
    fn default() -> Self {
        Self::new(&AutoTriggerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{native_call_response, registry};

    fn input<'a>(
        response: &'a ModelResponse,
        user_message: &'a str,
        registry: &'a ToolRegistry,
        iteration: u32,
    ) -> DetectionInput<'a> {
        DetectionInput {
            response,
            user_message,
            registry,
            iteration,
        }
    }

    #[test]
    fn plain_answer_detects_nothing() {
        let reg = registry();
        let resp = ModelResponse::text("Paris is the capital of France.");
        let detector = ToolCallDetector::default();
        assert!(detector.detect(&input(&resp, "Capital of France?", &reg, 1)).is_none());
    }

    #[test]
    fn structured_call_beats_bracket_marker() {
        let reg = registry();
        let mut resp = native_call_response("calculate", serde_json::json!({"expression": "12 * 7"}));
        resp.text = "[FUNCTION_CALL: convert_currency(amount=5, from=USD, to=EUR)]".into();
        resp.raw["content"] = resp.text.clone().into();

        let detection = ToolCallDetector::default()
            .detect(&input(&resp, "Calculate 12 * 7", &reg, 1))
            .unwrap();
        assert_eq!(detection.method, "native");
        assert_eq!(detection.calls.len(), 1);
        assert_eq!(detection.calls[0].name, "calculate");
    }

    #[test]
    fn weather_auto_trigger_overrides_model_answer() {
        let reg = registry();
        let resp = ModelResponse::text("It is probably sunny in Tokyo.");
        let detection = ToolCallDetector::default()
            .detect(&input(&resp, "What's the weather in Tokyo today?", &reg, 1))
            .unwrap();
        assert_eq!(detection.method, "auto_trigger");
        assert_eq!(detection.calls[0].name, "get_weather");
        assert_eq!(detection.calls[0].arguments["location"], "Tokyo");
    }

    #[test]
    fn weather_auto_trigger_overrides_structured_call() {
        let reg = registry();
        let resp = native_call_response("search_web", serde_json::json!({"query": "tokyo"}));
        let detection = ToolCallDetector::default()
            .detect(&input(&resp, "What's the weather in Tokyo today?", &reg, 1))
            .unwrap();
        assert_eq!(detection.method, "auto_trigger");
        assert_eq!(detection.calls[0].name, "get_weather");
    }

    #[test]
    fn detection_is_idempotent() {
        let reg = registry();
        let resp = ModelResponse::text(
            r#"Let me compute. {"function": "calculate", "arguments": {"expression": "3 + 4"}}"#,
        );
        let detector = ToolCallDetector::default();
        let i = input(&resp, "add three and four", &reg, 2);
        assert_eq!(detector.detect(&i), detector.detect(&i));
    }

    #[test]
    fn synthesized_ids_differ_across_iterations() {
        let reg = registry();
        let resp = ModelResponse::text("[TOOL: calculate(expression=\"1+1\")]");
        let detector = ToolCallDetector::default();
        let first = detector.detect(&input(&resp, "one plus one", &reg, 2)).unwrap();
        let second = detector.detect(&input(&resp, "one plus one", &reg, 3)).unwrap();
        assert_eq!(first.calls[0].id, "call_marker_2_0");
        assert_eq!(second.calls[0].id, "call_marker_3_0");
    }

    #[test]
    fn structured_only_ignores_text() {
        let reg = registry();
        let resp = ModelResponse::text("[TOOL: calculate(expression=\"1+1\")]");
        let detector = ToolCallDetector::structured_only();
        assert_eq!(detector.method_names(), vec!["native", "legacy_function_call"]);
        assert!(detector.detect(&input(&resp, "1+1", &reg, 1)).is_none());
    }

    #[test]
    fn default_cascade_order() {
        assert_eq!(
            ToolCallDetector::default().method_names(),
            vec![
                "auto_trigger",
                "native",
                "legacy_function_call",
                "embedded_json",
                "bracket_marker",
                "phrasal",
            ]
        );
    }
}
