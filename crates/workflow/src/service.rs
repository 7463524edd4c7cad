//! Chat service: session history in, pipeline, session history out.

use std::sync::Arc;

use conductor_core::session::SessionStore;
use tracing::warn;

use crate::context::{FinalResult, PipelineInput, ServiceBindings};
use crate::error::EngineError;
use crate::pipeline::Pipeline;

pub struct ChatService {
    pipeline: Pipeline,
    services: ServiceBindings,
    store: Arc<dyn SessionStore>,
}

impl ChatService {
    pub fn new(pipeline: Pipeline, services: ServiceBindings, store: Arc<dyn SessionStore>) -> Self {
        Self {
            pipeline,
            services,
            store,
        }
    }

    pub fn services(&self) -> &ServiceBindings {
        &self.services
    }

    /// Answer one message within a session.
    ///
    /// An unreadable session starts from empty history and a failed save
    /// only logs a warning; neither fails the request.
    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        retrieved_context: Option<String>,
    ) -> Result<FinalResult, EngineError> {
        let history = match self.store.load(session_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(
                    session_id,
                    store = self.store.name(),
                    error = %e,
                    "Could not load session, starting fresh"
                );
                Vec::new()
            }
        };

        let mut input = PipelineInput::new(message, session_id).with_history(history);
        input.retrieved_context = retrieved_context;

        let result = self.pipeline.execute(input, &self.services).await?;

        if let Err(e) = self.store.save(session_id, &result.conversation_history).await {
            warn!(session_id, store = self.store.name(), error = %e, "Could not save session");
        }
        Ok(result)
    }

    pub async fn reset(&self, session_id: &str) -> bool {
        match self.store.clear(session_id).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(session_id, error = %e, "Could not clear session");
                false
            }
        }
    }
}
