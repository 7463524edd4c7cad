//! # Conductor Core
//!
//! Domain types, traits, and error definitions for the Conductor tool-use
//! engine. This crate has **no framework dependencies**: it defines the
//! model every other crate implements against.
//!
//! ## Collaborators as traits
//!
//! The engine talks to three outside systems, each defined as a trait here:
//! - [`Provider`]: the language-model service
//! - [`Tool`] (collected in a [`ToolRegistry`]): external capabilities
//! - [`SessionStore`]: durable conversation history
//!
//! Implementations live in their respective crates, and tests swap in
//! scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, SessionError, ToolError};
pub use message::{Message, Role};
pub use provider::{ModelRequest, ModelResponse, Provider};
pub use session::{InMemorySessionStore, SessionStore};
pub use tool::{
    Confidence, ParamSpec, ParamType, Tool, ToolCall, ToolDefinition, ToolRegistry, ToolResult,
};
