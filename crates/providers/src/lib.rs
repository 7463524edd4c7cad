//! Model service implementations for Conductor.
//!
//! All providers implement the `conductor_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
