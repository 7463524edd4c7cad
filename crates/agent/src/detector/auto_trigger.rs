//! Auto-trigger: tool calls synthesized straight from the user's message.
//!
//! Weather and current-events questions are answered from tools no matter
//! what the model said, because a model answering them from its training
//! data is confidently wrong. The override is a policy
//! ([`AutoTriggerConfig`]) and can be narrowed or switched off.

use std::sync::LazyLock;

use conductor_config::AutoTriggerConfig;
use conductor_core::tool::ToolCall;
use regex_lite::Regex;
use serde_json::Map;

use super::extract::{extract_location, extract_search_query, find_year};
use super::{DetectionInput, DetectionMethod};

static WEATHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:weather|forecast|temperature|rain(?:ing|y)?|snow(?:ing|y)?|sunny|humidity|humid|cloudy|windy)\b",
    )
    .unwrap()
});

static CURRENT_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:latest|current|currently|recent|recently|news|headlines|breaking|this\s+(?:week|month|year)|right\s+now|nowadays|who\s+won|stock\s+price|election)\b",
    )
    .unwrap()
});

static ARITHMETIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\s*[-+*/^x×÷]\s*\d").unwrap());

const WEATHER_TOOL: &str = "get_weather";
const SEARCH_TOOL: &str = "search_web";

/// Whether the message asks about the weather.
pub fn is_weather_query(message: &str) -> bool {
    WEATHER.is_match(message)
}

/// Whether the message asks about something time-sensitive.
///
/// Arithmetic is excluded so "what is 2024 - 1990" stays with the
/// calculator.
pub fn is_current_info_query(message: &str) -> bool {
    if ARITHMETIC.is_match(message) {
        return false;
    }
    CURRENT_INFO.is_match(message) || find_year(message).is_some()
}

pub struct AutoTrigger {
    policy: AutoTriggerConfig,
}

impl AutoTrigger {
    pub fn new(policy: AutoTriggerConfig) -> Self {
        Self { policy }
    }
}

impl DetectionMethod for AutoTrigger {
    fn name(&self) -> &'static str {
        "auto_trigger"
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<ToolCall> {
        // Later iterations carry the tool output the trigger asked for;
        // firing again would loop on the same call.
        if !self.policy.enabled || input.iteration != 1 {
            return Vec::new();
        }
        let message = input.user_message;

        if self.policy.weather && input.registry.contains(WEATHER_TOOL) && is_weather_query(message)
        {
            let location =
                extract_location(message).unwrap_or_else(|| self.policy.default_location.clone());
            let mut args = Map::new();
            args.insert("location".into(), location.into());
            return vec![ToolCall::with_id("call_auto_get_weather", WEATHER_TOOL, args)];
        }

        if self.policy.search
            && input.registry.contains(SEARCH_TOOL)
            && is_current_info_query(message)
        {
            if let Some(query) = extract_search_query(message, find_year(message)) {
                let mut args = Map::new();
                args.insert("query".into(), query.into());
                return vec![ToolCall::with_id("call_auto_search_web", SEARCH_TOOL, args)];
            }
        }

        Vec::new()
    }
}
