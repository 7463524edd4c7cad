//! Natural-language intent: "I will use X", "X(", "using X", "need X".
//!
//! The weakest method and the last one consulted. A match only counts when
//! the per-tool templates can also recover arguments (from the response,
//! then from the user's message) or the tool takes none.

use conductor_core::tool::{ToolCall, ToolDefinition};
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::trace;

use super::extract::{parse_arguments, response_arguments, template_arguments};
use super::{DetectionInput, DetectionMethod};

pub struct PhrasalIntent;

/// Patterns for one tool name. `snake_case` names also match with spaces.
struct IntentPatterns {
    intent: Regex,
    call_syntax: Regex,
}

impl IntentPatterns {
    fn for_tool(name: &str) -> Option<Self> {
        let name = regex_lite::escape(name).replace('_', "[ _]");
        let intent = Regex::new(&format!(
            r"(?i)(?:\b(?:i\s+will|i'll|let\s+me|i\s+should|i\s+can)\s+(?:use|call|invoke|run)\s+(?:the\s+)?{name}\b|\busing\s+(?:the\s+)?{name}\b|\bneeds?\s+(?:to\s+(?:use|call)\s+)?(?:the\s+)?{name}\b)"
        ))
        .ok()?;
        let call_syntax = Regex::new(&format!(r"(?is)\b{name}\s*\((.*?)\)")).ok()?;
        Some(Self {
            intent,
            call_syntax,
        })
    }
}

impl PhrasalIntent {
    fn arguments_for(
        definition: &ToolDefinition,
        patterns: &IntentPatterns,
        input: &DetectionInput<'_>,
    ) -> Option<Map<String, Value>> {
        let text = &input.response.text;

        if let Some(caps) = patterns.call_syntax.captures(text) {
            let args = parse_arguments(&caps[1], Some(definition));
            if !args.is_empty() {
                return Some(args);
            }
        } else if !patterns.intent.is_match(text) {
            return None;
        }

        let from_response = response_arguments(&definition.name, text);
        if !from_response.is_empty() {
            return Some(from_response);
        }
        Some(template_arguments(&definition.name, input.user_message))
    }
}

impl DetectionMethod for PhrasalIntent {
    fn name(&self) -> &'static str {
        "phrasal"
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        for definition in input.registry.definitions() {
            let Some(patterns) = IntentPatterns::for_tool(&definition.name) else {
                continue;
            };
            let Some(arguments) = Self::arguments_for(&definition, &patterns, input) else {
                continue;
            };
            if arguments.is_empty() && definition.requires_arguments() {
                trace!(tool = %definition.name, "Phrasal intent without usable arguments");
                continue;
            }
            let id = input.call_id("phrasal", calls.len());
            calls.push(ToolCall::with_id(id, definition.name, arguments));
        }
        calls
    }
}
