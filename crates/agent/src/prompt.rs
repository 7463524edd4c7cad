//! Prompt text: the system prompt, retrieval merge, follow-up instructions,
//! and the fixed answers for terminal states.

use chrono::NaiveDate;
use conductor_core::tool::ToolDefinition;

/// Tag the retrieval collaborator puts on context that describes an image.
pub const IMAGE_TAG: &str = "[image-description]";

/// Prefix the engine forces onto answers built from failed tool calls.
pub const UNCERTAINTY_PREFIX: &str = "I'm not certain, but ";

/// Openings that already mark an answer as uncertain.
pub const UNCERTAINTY_MARKERS: &[&str] = &[
    "I'm not certain",
    "I am not certain",
    "I'm not sure",
    "I am not sure",
    "I couldn't verify",
    "I could not verify",
    "Unfortunately",
];

pub const FOLLOWUP_INSTRUCTION: &str = "Using only the tool results above, answer my original \
     question directly. Do not mention tools, functions, searches, or how you obtained the \
     information.";

pub const HEDGED_FOLLOWUP_INSTRUCTION: &str = "At least one tool failed, so the information \
     above is incomplete. Begin your answer with \"I'm not certain, but\" and answer my \
     original question as well as you can. Do not mention tools, functions, or searches.";

pub const MAX_ITERATIONS_ANSWER: &str = "I wasn't able to complete this request within the \
     allowed number of steps. Please try asking a simpler or more specific question.";

pub const DEGRADED_ANSWER: &str = "I'm having trouble reaching the language model service \
     right now. Please try again in a moment.";

pub const AUTH_REQUIRED_ANSWER: &str = "The language model service rejected the configured \
     credentials. Set a valid API key (CONDUCTOR_API_KEY or `api_key` in \
     ~/.conductor/config.toml) and try again.";

/// The system prompt: persona, answering rules, available tools, and
/// today's date so "today" and "this year" resolve correctly.
pub fn system_prompt(tools: &[ToolDefinition], today: NaiveDate) -> String {
    let mut prompt = String::from(
        "You are Conductor, a helpful assistant that answers questions accurately and concisely.\n\n\
         Rules:\n\
         - When a question needs live data (weather, news, recent events, exchange rates) or \
         exact arithmetic, call the matching tool instead of guessing.\n\
         - Never describe which tools you used or how you found the answer.\n\
         - If a tool fails, say you could not verify the information.\n",
    );

    if !tools.is_empty() {
        prompt.push_str("\nAvailable tools:\n");
        for tool in tools {
            let params: Vec<String> = tool
                .params
                .iter()
                .map(|p| {
                    let marker = if p.required { "" } else { "?" };
                    format!("{}{marker}: {}", p.name, p.ty.as_str())
                })
                .collect();
            prompt.push_str(&format!(
                "- {}({}): {}\n",
                tool.name,
                params.join(", "),
                tool.description
            ));
        }
    }

    prompt.push_str(&format!("\nToday's date is {}.", today.format("%A, %B %-d, %Y")));
    prompt
}

/// Merge retrieved context into the latest user turn. Blank context leaves
/// the message as is.
pub fn merge_retrieved_context(user_message: &str, context: Option<&str>) -> String {
    let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) else {
        return user_message.to_string();
    };

    if context.contains(IMAGE_TAG) {
        format!(
            "The user shared an image. Its description follows; treat it as what you can see.\n\n\
             {context}\n\nQuestion: {user_message}"
        )
    } else {
        format!(
            "Use the following background information if it is relevant. Ignore it otherwise.\n\n\
             Context:\n{context}\n\nQuestion: {user_message}"
        )
    }
}

/// The instruction appended after each batch of tool results.
pub fn followup_instruction(hedge: bool) -> &'static str {
    if hedge {
        HEDGED_FOLLOWUP_INSTRUCTION
    } else {
        FOLLOWUP_INSTRUCTION
    }
}

pub fn starts_uncertain(answer: &str) -> bool {
    let answer = answer.trim_start();
    UNCERTAINTY_MARKERS.iter().any(|m| answer.starts_with(m))
}

/// Prefix `answer` with [`UNCERTAINTY_PREFIX`] unless it already opens with
/// an uncertainty marker.
pub fn hedge(answer: &str) -> String {
    let answer = answer.trim_start();
    if starts_uncertain(answer) {
        return answer.to_string();
    }
    let keep_case = answer.starts_with("I ") || answer.starts_with("I'");
    let mut chars = answer.chars();
    let rest: String = match chars.next() {
        Some(first) if !keep_case => first.to_lowercase().chain(chars).collect(),
        Some(first) => std::iter::once(first).chain(chars).collect(),
        None => String::new(),
    };
    format!("{UNCERTAINTY_PREFIX}{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::tool::{ParamSpec, ParamType};

    #[test]
    fn system_prompt_lists_tools_and_date() {
        let tools = vec![ToolDefinition {
            name: "get_weather".into(),
            description: "Current weather".into(),
            params: vec![
                ParamSpec::required("location", ParamType::String, "City"),
                ParamSpec::optional("units", ParamType::String, "metric or imperial"),
            ],
        }];
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let prompt = system_prompt(&tools, date);
        assert!(prompt.contains("- get_weather(location: string, units?: string): Current weather"));
        assert!(prompt.ends_with("Today's date is Saturday, March 14, 2026."));
    }

    #[test]
    fn blank_context_is_ignored() {
        assert_eq!(merge_retrieved_context("hi", None), "hi");
        assert_eq!(merge_retrieved_context("hi", Some("  \n")), "hi");
    }

    #[test]
    fn image_context_selects_image_wording() {
        let merged = merge_retrieved_context(
            "What breed is this?",
            Some("[image-description] A small dog with curly white fur."),
        );
        assert!(merged.starts_with("The user shared an image."));
        assert!(merged.ends_with("Question: What breed is this?"));

        let merged = merge_retrieved_context("Who wrote it?", Some("Dune, 1965 novel"));
        assert!(merged.contains("Context:\nDune, 1965 novel"));
    }

    #[test]
    fn hedging_prefixes_once() {
        assert_eq!(hedge("It is 20°C in Paris."), "I'm not certain, but it is 20°C in Paris.");
        assert_eq!(
            hedge("I think it is sunny."),
            "I'm not certain, but I think it is sunny."
        );
        assert_eq!(hedge("Unfortunately the data is missing."), "Unfortunately the data is missing.");
        assert!(starts_uncertain("  I couldn't verify that."));
    }

    #[test]
    fn followup_wording() {
        assert!(followup_instruction(true).contains("I'm not certain, but"));
        assert!(!followup_instruction(false).contains("not certain"));
    }
}
