//! Bracketed marker syntax: `[FUNCTION_CALL: name(args)]`.

use std::sync::LazyLock;

use conductor_core::tool::ToolCall;
use regex_lite::Regex;

use super::extract::parse_arguments;
use super::{DetectionInput, DetectionMethod};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)\[\s*(?:FUNCTION_CALL|FUNCTION|TOOL_CALL|TOOL|CALL)\s*:\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.*?)\)\s*\]",
    )
    .unwrap()
});

pub struct BracketMarker;

impl DetectionMethod for BracketMarker {
    fn name(&self) -> &'static str {
        "bracket_marker"
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        for caps in MARKER.captures_iter(&input.response.text) {
            let name = &caps[1];
            let Some(definition) = input.registry.definition(name) else {
                continue;
            };
            let arguments = parse_arguments(&caps[2], Some(&definition));
            let id = input.call_id("marker", calls.len());
            calls.push(ToolCall::with_id(id, name, arguments));
        }
        calls
    }
}
