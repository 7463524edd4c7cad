//! Argument extraction from free text.
//!
//! Shared by the textual detection methods: argument-list parsing for
//! marker syntax, and the per-tool templates the phrasal and auto-trigger
//! methods use to pull arguments out of prose.

use std::sync::LazyLock;

use conductor_core::tool::ToolDefinition;
use regex_lite::Regex;
use serde_json::{Map, Value};

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*["']?([A-Za-z_][A-Za-z0-9_]*)["']?\s*[=:]\s*(.*?)\s*$"#).unwrap()
});

static LOCATION_PREP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:in|at|for|near|around)\s+").unwrap());

static LOCATION_BEFORE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    // Latin-1 and Latin Extended-A letters, so "Zürich" and "Kraków" stay whole.
    Regex::new(
        r"([A-ZÀ-ÖØ-Þ][a-zß-öø-ÿĀ-ž]+(?:\s+[A-ZÀ-ÖØ-Þ][a-zß-öø-ÿĀ-ž]+)*)(?:'s)?\s+(?i:weather|forecast|temperature)",
    )
    .unwrap()
});

static EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-(\d][\d\s.,()+\-*/%^x×÷]*[\d)]").unwrap());

static HAS_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d)]\s*[-+*/%^x×÷]\s*[-(\d]").unwrap());

static WORD_OPERATORS: LazyLock<[(Regex, &'static str); 5]> = LazyLock::new(|| {
    [
        (Regex::new(r"(?i)\s+plus\s+").unwrap(), " + "),
        (Regex::new(r"(?i)\s+minus\s+").unwrap(), " - "),
        (Regex::new(r"(?i)\s+(?:times|multiplied\s+by)\s+").unwrap(), " * "),
        (Regex::new(r"(?i)\s+divided\s+by\s+").unwrap(), " / "),
        (Regex::new(r"(?i)\s+(?:to\s+the\s+power\s+of|raised\s+to)\s+").unwrap(), " ^ "),
    ]
});

static SEARCH_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:please\s+)?(?:(?:can|could|would)\s+you\s+)?(?:please\s+)?(?:search\s+(?:the\s+web\s+|online\s+)?for|look\s+up|google|find\s+out|tell\s+me\s+about)\s+",
    )
    .unwrap()
});

static SEARCH_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsearch(?:_web|ing|\s+the\s+web)?\s+for\s+["']?([^"'\n.?!]+)"#).unwrap()
});

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([A-Za-z]{3})\s+(?:to|in|into)\s+([A-Za-z]{3})\b").unwrap()
});

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b20[2-9]\d\b").unwrap());

/// Words that end a location phrase.
const LOCATION_STOPWORDS: &[&str] = &[
    "today", "tomorrow", "tonight", "now", "right", "this", "next", "currently", "weather",
    "forecast", "temperature", "like", "please", "and", "or", "with", "on", "during", "later",
    "outside", "the", "a", "an", "me", "my", "us", "it", "week", "weekend", "morning",
    "afternoon", "evening", "celsius", "fahrenheit", "that", "these", "those", "you", "your",
    "them", "what", "which", "there", "here",
];

/// Capitalized words that start a question rather than name a place.
const QUESTION_WORDS: &[&str] = &[
    "What", "How", "Is", "Will", "Tell", "Show", "Give", "Check", "Get", "The", "Today",
    "Tomorrow", "Current", "Whats", "Can", "Could", "Please",
];

const MAX_LOCATION_WORDS: usize = 4;

/// Parse an argument list from marker syntax.
///
/// Accepts a JSON object, `key=value` / `key: value` pairs, or positional
/// values mapped onto the definition's parameter order. Returns an empty
/// map when nothing usable is found.
pub fn parse_arguments(raw: &str, definition: Option<&ToolDefinition>) -> Map<String, Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Map::new();
    }

    if raw.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
            return map;
        }
    }

    let pieces = split_top_level(raw);
    let keyed = pieces.iter().any(|p| KEY_VALUE.is_match(p));

    let mut args = Map::new();
    if keyed {
        for piece in &pieces {
            if let Some(caps) = KEY_VALUE.captures(piece) {
                args.insert(caps[1].to_string(), scalar(&caps[2]));
            }
        }
        return args;
    }

    let Some(def) = definition else {
        return args;
    };

    // A single-parameter tool takes the whole list, so "12 * 7" or
    // "1,000 + 5" is not split apart.
    if def.params.len() == 1 {
        args.insert(def.params[0].name.clone(), scalar(raw));
        return args;
    }

    for (param, piece) in def.params.iter().zip(pieces.iter()) {
        if !piece.trim().is_empty() {
            args.insert(param.name.clone(), scalar(piece));
        }
    }
    args
}

/// Split on commas outside quotes, brackets and braces.
fn split_top_level(raw: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(ch);
                }
                ',' if depth == 0 => pieces.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            },
        }
    }
    pieces.push(current);
    pieces.into_iter().map(|p| p.trim().to_string()).collect()
}

/// Interpret a bare argument value.
fn scalar(raw: &str) -> Value {
    let raw = raw.trim();
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = unquoted {
        return Value::String(s.to_string());
    }

    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return n.into();
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/// Find a location in a weather-style request.
///
/// Tries each "in/at/for/near/around <place>" phrase in order and then
/// falls back to capitalized words directly before a weather keyword.
pub fn extract_location(text: &str) -> Option<String> {
    for prep in LOCATION_PREP.find_iter(text) {
        let rest = &text[prep.end()..];
        let phrase_end = rest
            .find(|c: char| !(c.is_alphabetic() || matches!(c, '\'' | '-' | ' ')))
            .unwrap_or(rest.len());

        let mut words: Vec<&str> = Vec::new();
        let mut tokens = rest[..phrase_end].split_whitespace().peekable();
        if tokens.peek().is_some_and(|w| w.eq_ignore_ascii_case("the")) {
            tokens.next();
        }
        for word in tokens {
            let bare = word.trim_matches(|c: char| c == '\'' || c == '-');
            if bare.is_empty() || LOCATION_STOPWORDS.contains(&bare.to_lowercase().as_str()) {
                break;
            }
            words.push(bare);
            if words.len() == MAX_LOCATION_WORDS {
                break;
            }
        }
        if !words.is_empty() {
            return Some(title_case_if_lower(&words.join(" ")));
        }
    }

    for caps in LOCATION_BEFORE_KEYWORD.captures_iter(text) {
        let words: Vec<&str> = caps[1]
            .split_whitespace()
            .skip_while(|w| QUESTION_WORDS.contains(w))
            .collect();
        if !words.is_empty() && words.len() <= MAX_LOCATION_WORDS {
            return Some(words.join(" "));
        }
    }
    None
}

fn title_case_if_lower(s: &str) -> String {
    if s.chars().any(|c| c.is_uppercase()) {
        return s.to_string();
    }
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Find an arithmetic expression, normalizing spelled-out operators.
pub fn extract_expression(text: &str) -> Option<String> {
    let mut normalized = text.to_string();
    for (re, symbol) in WORD_OPERATORS.iter() {
        normalized = re.replace_all(&normalized, *symbol).into_owned();
    }

    EXPRESSION
        .find_iter(&normalized)
        .map(|m| m.as_str().trim())
        .filter(|m| HAS_OPERATOR.is_match(m))
        .max_by_key(|m| m.len())
        .map(str::to_string)
}

/// Turn a request into a search query.
///
/// Strips request filler and trailing punctuation, then appends `year`
/// when given and not already part of the query.
pub fn extract_search_query(text: &str, year: Option<&str>) -> Option<String> {
    let stripped = SEARCH_FILLER.replace(text, "");
    let mut query = stripped
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string();
    if query.is_empty() {
        return None;
    }
    if let Some(year) = year {
        if !query.contains(year) {
            query.push(' ');
            query.push_str(year);
        }
    }
    Some(query)
}

/// Find "<amount> <CODE> to <CODE>".
pub fn extract_currency(text: &str) -> Option<Map<String, Value>> {
    let caps = CURRENCY.captures(text)?;
    let amount: f64 = caps[1].replace(',', "").parse().ok()?;

    let mut args = Map::new();
    args.insert("amount".into(), scalar(&amount.to_string()));
    args.insert("from".into(), caps[2].to_uppercase().into());
    args.insert("to".into(), caps[3].to_uppercase().into());
    Some(args)
}

/// First four-digit year from 2020 onward.
pub fn find_year(text: &str) -> Option<&str> {
    YEAR.find(text).map(|m| m.as_str())
}

/// Per-tool template for the model's own prose. Only an explicit
/// "search for ..." phrase yields a query here; everything else matches
/// [`template_arguments`].
pub fn response_arguments(tool: &str, text: &str) -> Map<String, Value> {
    if tool != "search_web" {
        return template_arguments(tool, text);
    }
    let mut args = Map::new();
    if let Some(caps) = SEARCH_FOR.captures(text) {
        let query = caps[1].trim();
        if !query.is_empty() {
            args.insert("query".into(), query.into());
        }
    }
    args
}

/// Per-tool argument template applied to a user request. Unknown tools get
/// an empty map.
pub fn template_arguments(tool: &str, text: &str) -> Map<String, Value> {
    let mut args = Map::new();
    match tool {
        "get_weather" => {
            if let Some(location) = extract_location(text) {
                args.insert("location".into(), location.into());
            }
        }
        "calculate" => {
            if let Some(expression) = extract_expression(text) {
                args.insert("expression".into(), expression.into());
            }
        }
        "search_web" => {
            if let Some(query) = extract_search_query(text, find_year(text)) {
                args.insert("query".into(), query.into());
            }
        }
        "convert_currency" => {
            if let Some(found) = extract_currency(text) {
                args = found;
            }
        }
        _ => {}
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::tool::{ParamSpec, ParamType};

    fn currency_def() -> ToolDefinition {
        ToolDefinition {
            name: "convert_currency".into(),
            description: String::new(),
            params: vec![
                ParamSpec::required("amount", ParamType::Number, ""),
                ParamSpec::required("from", ParamType::String, ""),
                ParamSpec::required("to", ParamType::String, ""),
            ],
        }
    }

    fn calculate_def() -> ToolDefinition {
        ToolDefinition {
            name: "calculate".into(),
            description: String::new(),
            params: vec![ParamSpec::required("expression", ParamType::String, "")],
        }
    }

    #[test]
    fn parses_json_arguments() {
        let args = parse_arguments(r#"{"location": "Paris"}"#, None);
        assert_eq!(args["location"], "Paris");
    }

    #[test]
    fn parses_key_value_arguments() {
        let args = parse_arguments(r#"amount=100, from="USD", to: EUR"#, None);
        assert_eq!(args["amount"], 100);
        assert_eq!(args["from"], "USD");
        assert_eq!(args["to"], "EUR");
    }

    #[test]
    fn positional_arguments_follow_param_order() {
        let args = parse_arguments("50, GBP, JPY", Some(&currency_def()));
        assert_eq!(args["amount"], 50);
        assert_eq!(args["from"], "GBP");
        assert_eq!(args["to"], "JPY");
    }

    #[test]
    fn single_param_takes_whole_list() {
        let args = parse_arguments("1,000 + 5", Some(&calculate_def()));
        assert_eq!(args["expression"], "1,000 + 5");
    }

    #[test]
    fn positional_without_definition_is_empty() {
        assert!(parse_arguments("Tokyo", None).is_empty());
        assert!(parse_arguments("   ", None).is_empty());
    }

    #[test]
    fn location_after_preposition() {
        assert_eq!(
            extract_location("What's the weather in Tokyo today?").as_deref(),
            Some("Tokyo")
        );
        assert_eq!(
            extract_location("forecast for new york city this weekend").as_deref(),
            Some("New York City")
        );
        assert_eq!(
            extract_location("Will it rain in the Bay Area tomorrow?").as_deref(),
            Some("Bay Area")
        );
    }

    #[test]
    fn location_skips_empty_phrases() {
        // "for today" yields nothing, so the next phrase is used
        assert_eq!(
            extract_location("What's the forecast for today in Berlin").as_deref(),
            Some("Berlin")
        );
    }

    #[test]
    fn location_before_keyword() {
        assert_eq!(extract_location("Paris weather please").as_deref(), Some("Paris"));
        assert_eq!(extract_location("What weather is expected").as_deref(), None);
    }

    #[test]
    fn accented_locations_stay_whole() {
        assert_eq!(
            extract_location("What's the weather in Zürich today?").as_deref(),
            Some("Zürich")
        );
        assert_eq!(
            extract_location("Is it raining in São Paulo?").as_deref(),
            Some("São Paulo")
        );
        assert_eq!(extract_location("weather in kraków").as_deref(), Some("Kraków"));
        assert_eq!(extract_location("Zürich weather please").as_deref(), Some("Zürich"));
    }

    #[test]
    fn expression_from_text() {
        assert_eq!(extract_expression("Calculate 12 * 7").as_deref(), Some("12 * 7"));
        assert_eq!(
            extract_expression("what is 5 plus 3, please").as_deref(),
            Some("5 + 3")
        );
        assert_eq!(extract_expression("I was born in 1990").as_deref(), None);
    }

    #[test]
    fn search_query_strips_filler_and_appends_year() {
        assert_eq!(
            extract_search_query("Can you search for the latest Rust release?", Some("2025"))
                .as_deref(),
            Some("the latest Rust release 2025")
        );
        assert_eq!(
            extract_search_query("Who won the 2024 election?", Some("2024")).as_deref(),
            Some("Who won the 2024 election")
        );
        assert_eq!(extract_search_query("  ?", None), None);
    }

    #[test]
    fn currency_from_text() {
        let args = extract_currency("convert 1,500 usd to eur").unwrap();
        assert_eq!(args["amount"], 1500);
        assert_eq!(args["from"], "USD");
        assert_eq!(args["to"], "EUR");
        assert!(extract_currency("how much is a euro").is_none());
    }

    #[test]
    fn year_detection() {
        assert_eq!(find_year("news from 2025 and 2026"), Some("2025"));
        assert_eq!(find_year("back in 1999"), None);
    }

    #[test]
    fn response_search_needs_explicit_phrase() {
        let args = response_arguments("search_web", "I'll search the web for \"mars rover news\".");
        assert_eq!(args["query"], "mars rover news");
        assert!(response_arguments("search_web", "Searching would help.").is_empty());
    }

    #[test]
    fn unknown_tool_template_is_empty() {
        assert!(template_arguments("send_email", "email bob").is_empty());
    }
}
