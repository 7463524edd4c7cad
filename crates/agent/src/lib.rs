//! The tool-use agent loop: the heart of Conductor.
//!
//! Each request runs a bounded **call → detect → execute → append** cycle:
//!
//! 1. **Call** the model with the conversation and the tool schema
//! 2. **Detect** tool-call intent in the response via a priority cascade
//!    ([`detector`])
//! 3. **Execute** detected calls through the [`ToolRegistry`](conductor_core::ToolRegistry),
//!    folding failures into low-confidence results
//! 4. **Append** the calls, their results, and an instruction to answer
//!    silently; loop back to 1
//!
//! The loop ends when a response carries no tool calls, or when the
//! iteration cap is reached. The [`sanitizer`] then strips tool-usage
//! narration from the answer.

pub mod detector;
pub mod loop_runner;
pub mod prompt;
pub mod sanitizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use detector::{Detection, DetectionInput, DetectionMethod, ToolCallDetector};
pub use loop_runner::{AgentLoop, AgentOutcome, ExecutedCall, TerminalState};
pub use sanitizer::{ResponseSanitizer, SanitizeAction, Sanitized};
