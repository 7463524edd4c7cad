//! Response sanitizer: strips tool-usage narration from final answers.
//!
//! Removal runs in repeated passes so that phrases exposed by an earlier
//! removal are caught too. Two guards bound the result:
//!
//! - if cleaning would leave fewer than `min_length` chars, the original
//!   text is returned untouched;
//! - if the answer is dominated by protocol noise or degenerate character
//!   runs, it is replaced by a fixed guidance message.

use std::sync::LazyLock;

use conductor_config::SanitizerConfig;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Returned instead of an answer that is mostly noise.
pub const GUIDANCE_MESSAGE: &str = "I wasn't able to put together a clear answer to that. \
     Could you rephrase your question or add a little more detail?";

/// Ordered removals: tool narration, knowledge-cutoff disclaimers, then
/// hedging preambles. None of them touch "I'm not certain", which is how
/// low-confidence answers are marked.
static REMOVALS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // leftover marker syntax
        r"(?i)\[\s*(?:FUNCTION_CALL|TOOL_CALL|FUNCTION|TOOL|CALL)\s*:[^\]]*\]",
        // "Let me use the weather tool." / "I'll search the web for that."
        r"(?i)(?:^|\b)(?:let\s+me|i\s+will|i'll|i\s+am\s+going\s+to|i'm\s+going\s+to)\s+(?:use|call|invoke|run|check|search|look\s+up|query)\b[^.!?\n]*[.!?:]?",
        // "I used the calculate tool, " / "After calling the function, "
        r"(?i)\b(?:i\s+(?:used|called|invoked|ran|queried|searched)|i've\s+(?:used|called|invoked|run|queried|searched)|after\s+(?:using|calling|running|searching))\s+(?:the\s+|a\s+)?[a-z_ ]*?(?:tool|function|search|calculator|web)\b[^.!?,:\n]*[,.:!]\s*",
        // "According to the weather tool, " / "Based on the search results: "
        r"(?i)\b(?:according\s+to|based\s+on)\s+(?:the\s+|my\s+)?(?:[a-z_]+\s+)?(?:tool|function|search\s+results?|web\s+search)(?:\s+(?:output|results?|data|response))?\s*[,:]?\s*",
        // "Using the calculate tool, " / "From the tool output "; a bare
        // "from the function" is ordinary prose
        r"(?i)\b(?:using|from)\s+(?:the\s+|my\s+)?(?:[a-z_]+\s+)?(?:tool|function|search\s+results?|web\s+search)(?:\s+(?:output|results?|data|response)\s*[,:]?|\s*[,:])\s*",
        // "The weather tool returned that "
        r"(?i)\bthe\s+(?:[a-z_]+\s+)?(?:tool|function)\s+(?:returned|says|shows|indicates|reports)\s+(?:that\s+)?",
        // knowledge cutoff, whole sentence
        r"(?i)[^.!?\n]*\b(?:knowledge\s+cutoff|my\s+training\s+data|as\s+of\s+my\s+last\s+(?:update|training)|(?:don't|do\s+not)\s+have\s+(?:access\s+to\s+)?real[- ]time)[^.!?\n]*[.!?]?\s*",
        // hedging preambles
        r"(?i)\bas\s+an\s+ai(?:\s+language\s+model|\s+assistant)?\s*,\s*",
        r"(?i)^\s*(?:sure|certainly|of\s+course|absolutely|great\s+question)\s*[!.,]\s*",
        r"(?i)\bit(?:'s|\s+is)\s+(?:worth\s+noting|important\s+to\s+note)\s+that\s+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.!?;:])").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").unwrap());

/// Markers of protocol or metadata leaking into an answer.
const NOISE_MARKERS: &[&str] = &[
    "function_call",
    "tool_call",
    "\"arguments\"",
    "\"role\":",
    "\"name\":",
    "\"confidence\"",
    "[FUNCTION",
    "<|",
    "|>",
    "```json",
    "NOTE: The tool failed",
];

/// Characters that legitimately repeat (rules, emphasis, tables).
const RUN_EXEMPT: &[char] = &['-', '=', '_', '*', '#', '~', '.', '0'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizeAction {
    /// Nothing matched
    Unchanged,
    /// Phrases were removed
    Cleaned,
    /// Cleaning went below the minimum length; the original was kept
    Reverted,
    /// Noise or degenerate output; replaced by [`GUIDANCE_MESSAGE`]
    Replaced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub text: String,
    pub action: SanitizeAction,
}

pub struct ResponseSanitizer {
    config: SanitizerConfig,
}

impl ResponseSanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Text with no removable phrase comes back as given, including blank
    /// text; callers decide what an empty answer becomes.
    pub fn sanitize(&self, text: &str) -> Sanitized {
        if text.trim().is_empty() {
            return unchanged(text);
        }
        if self.is_noise(text) {
            debug!(chars = text.len(), "Answer replaced with guidance message");
            return Sanitized {
                text: GUIDANCE_MESSAGE.to_string(),
                action: SanitizeAction::Replaced,
            };
        }

        let mut cleaned = text.to_string();
        for pass in 0..self.config.max_passes {
            let before = cleaned.clone();
            for re in REMOVALS.iter() {
                cleaned = re.replace_all(&cleaned, "").into_owned();
            }
            if cleaned == before {
                break;
            }
            debug!(pass, "Sanitizer removed phrases");
        }
        // Case and spacing fixes only tidy up after a removal.
        if cleaned == text {
            return unchanged(text);
        }
        let cleaned = capitalize_first(&collapse_whitespace(&cleaned));

        if cleaned.chars().count() < self.config.min_length {
            debug!(
                original = text.len(),
                cleaned = cleaned.len(),
                "Sanitized answer too short, keeping original"
            );
            return Sanitized {
                text: text.to_string(),
                action: SanitizeAction::Reverted,
            };
        }
        Sanitized {
            text: cleaned,
            action: SanitizeAction::Cleaned,
        }
    }

    fn is_noise(&self, text: &str) -> bool {
        let hits: usize = NOISE_MARKERS
            .iter()
            .map(|marker| text.matches(marker).count())
            .sum();
        hits >= self.config.noise_threshold || longest_run(text) >= self.config.max_char_run
    }
}

impl Default for ResponseSanitizer {
    fn default() -> Self {
        Self::new(&SanitizerConfig::default())
    }
}

fn unchanged(text: &str) -> Sanitized {
    Sanitized {
        text: text.to_string(),
        action: SanitizeAction::Unchanged,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let text = HORIZONTAL_SPACE.replace_all(text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
        _ => text.to_string(),
    }
}

/// Longest run of one repeated non-space character, ignoring [`RUN_EXEMPT`].
fn longest_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if ch.is_whitespace() || RUN_EXEMPT.contains(&ch) {
            prev = None;
            current = 0;
            continue;
        }
        if prev == Some(ch) {
            current += 1;
        } else {
            prev = Some(ch);
            current = 1;
        }
        longest = longest.max(current);
    }
    longest
}
