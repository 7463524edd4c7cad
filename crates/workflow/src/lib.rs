//! Request pipeline for Conductor.
//!
//! A request passes through five steps (validate, prepare context, run the
//! agent loop, process the response, finalize state), each with its own
//! retry budget, all under one request deadline. [`ChatService`] wraps the
//! pipeline with session history loading and saving.

pub mod context;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod step;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{AgentMetadata, ExecutionContext, FinalResult, PipelineInput, ServiceBindings};
pub use error::EngineError;
pub use pipeline::{EMPTY_ANSWER, Pipeline};
pub use service::ChatService;
pub use step::{Step, StepHandler, StepRunner};
