//! Structured call fields on the raw response.

use conductor_core::tool::ToolCall;
use serde_json::{Map, Value};

use super::{DetectionInput, DetectionMethod};

/// `tool_calls: [{id, function: {name, arguments}}]` on the raw message.
pub struct NativeToolCalls;

impl DetectionMethod for NativeToolCalls {
    fn name(&self) -> &'static str {
        "native"
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall> {
        let Some(calls) = input.response.raw.get("tool_calls").and_then(Value::as_array) else {
            return Vec::new();
        };

        calls
            .iter()
            .enumerate()
            .filter_map(|(i, call)| {
                // Flat {name, arguments} entries show up from some
                // compatible servers.
                let function = call.get("function").unwrap_or(call);
                let name = function.get("name").and_then(Value::as_str)?;
                if name.is_empty() {
                    return None;
                }
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| input.call_id("native", i));
                Some(ToolCall::with_id(
                    id,
                    name,
                    arguments_value(function.get("arguments")),
                ))
            })
            .collect()
    }
}

/// The single legacy `function_call: {name, arguments}` field.
pub struct LegacyFunctionCall;

impl DetectionMethod for LegacyFunctionCall {
    fn name(&self) -> &'static str {
        "legacy_function_call"
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall> {
        let Some(function) = input.response.raw.get("function_call") else {
            return Vec::new();
        };
        match function.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => vec![ToolCall::with_id(
                input.call_id("legacy", 0),
                name,
                arguments_value(function.get("arguments")),
            )],
            _ => Vec::new(),
        }
    }
}

/// Arguments arrive either as a JSON-encoded string or as an object.
/// Anything unparseable becomes an empty map so the tool reports the
/// missing parameters itself.
pub(super) fn arguments_value(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::registry;
    use conductor_core::provider::ModelResponse;
    use serde_json::json;

    fn detect_with(method: &dyn DetectionMethod, raw: Value) -> Vec<ToolCall> {
        let reg = registry();
        let response = ModelResponse {
            text: String::new(),
            raw,
            model: "mock".into(),
        };
        method.detect(&DetectionInput {
            response: &response,
            user_message: "",
            registry: &reg,
            iteration: 1,
        })
    }

    #[test]
    fn native_calls_with_string_arguments() {
        let calls = detect_with(
            &NativeToolCalls,
            json!({
                "tool_calls": [
                    {"id": "call_abc", "type": "function",
                     "function": {"name": "calculate", "arguments": "{\"expression\":\"2+2\"}"}},
                    {"type": "function",
                     "function": {"name": "get_weather", "arguments": {"location": "Oslo"}}}
                ]
            }),
        );
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].arguments["expression"], "2+2");
        assert_eq!(calls[1].id, "call_native_1_1");
        assert_eq!(calls[1].arguments["location"], "Oslo");
    }

    #[test]
    fn native_malformed_arguments_become_empty() {
        let calls = detect_with(
            &NativeToolCalls,
            json!({"tool_calls": [{"function": {"name": "calculate", "arguments": "{not json"}}]}),
        );
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn native_ignores_missing_field() {
        assert!(detect_with(&NativeToolCalls, json!({"content": "hi"})).is_empty());
        assert!(detect_with(&NativeToolCalls, json!({"tool_calls": []})).is_empty());
    }

    #[test]
    fn legacy_function_call() {
        let calls = detect_with(
            &LegacyFunctionCall,
            json!({"function_call": {"name": "search_web", "arguments": "{\"query\":\"rust\"}"}}),
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_web");
        assert_eq!(calls[0].arguments["query"], "rust");
    }
}
