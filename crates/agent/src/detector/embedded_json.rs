//! JSON objects embedded in the response text.
//!
//! Models without native function calling often write the call as a JSON
//! object somewhere in their prose. Every balanced `{...}` span is tried;
//! spans that fail to parse or do not name a registered tool are skipped.

use conductor_core::tool::ToolCall;
use serde_json::{Map, Value};

use super::structured::arguments_value;
use super::{DetectionInput, DetectionMethod};

const NAME_KEYS: [&str; 4] = ["function", "name", "tool_name", "function_name"];
const ARGUMENT_KEYS: [&str; 4] = ["arguments", "parameters", "args", "input"];

pub struct EmbeddedJson;

impl DetectionMethod for EmbeddedJson {
    fn name(&self) -> &'static str {
        "embedded_json"
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        for span in object_spans(&input.response.text) {
            let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(span) else {
                continue;
            };
            let Some((name, arguments)) = call_from_object(&obj) else {
                continue;
            };
            if !input.registry.contains(&name) {
                continue;
            }
            let id = input.call_id("json", calls.len());
            calls.push(ToolCall::with_id(id, name, arguments));
        }
        calls
    }
}

/// Pull `(name, arguments)` out of one object. `function` may itself be an
/// object carrying both.
fn call_from_object(obj: &Map<String, Value>) -> Option<(String, Map<String, Value>)> {
    if let Some(Value::Object(inner)) = obj.get("function") {
        return call_from_object(inner);
    }

    let name = NAME_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .filter(|n| !n.is_empty())?;
    let arguments = arguments_value(ARGUMENT_KEYS.iter().find_map(|key| obj.get(*key)));
    Some((name.to_string(), arguments))
}

/// Top-level balanced-brace spans, ignoring braces inside string literals.
fn object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}
