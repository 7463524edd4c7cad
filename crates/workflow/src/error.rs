//! Engine-level error taxonomy.

use conductor_core::error::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input. Never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A pipeline step failed on every attempt.
    #[error("Step '{step}' failed after {attempts} attempt(s): {last_error}")]
    StepExhausted {
        step: String,
        attempts: u32,
        #[source]
        last_error: Box<EngineError>,
    },

    #[error("Model call failed: {0}")]
    ModelCall(#[from] ProviderError),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EngineError::Validation(_))
    }

    /// The failure underneath any `StepExhausted` wrapping.
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::StepExhausted { last_error, .. } => last_error.root(),
            other => other,
        }
    }

    /// A hint the user can act on.
    pub fn remediation(&self) -> String {
        match self.root() {
            EngineError::Validation(reason) => {
                format!("{reason}. Please adjust your message and try again.")
            }
            EngineError::ModelCall(e) if e.is_auth_failure() => {
                "The language model service rejected the configured credentials. \
                 Set CONDUCTOR_API_KEY (or api_key in ~/.conductor/config.toml)."
                    .into()
            }
            EngineError::ModelCall(ProviderError::RateLimited { retry_after_secs }) => {
                format!("The model service is rate limiting requests. Try again in {retry_after_secs}s.")
            }
            EngineError::ModelCall(ProviderError::ModelNotFound(model)) => format!(
                "The model '{model}' is not available. Check model.primary in your config \
                 or set CONDUCTOR_MODEL."
            ),
            EngineError::ModelCall(_) => {
                "The language model service is unavailable right now. Check your network \
                 connection and model.base_url, then try again."
                    .into()
            }
            EngineError::Timeout { secs } => format!(
                "The request took longer than {secs}s. Try a simpler question or raise \
                 pipeline.request_timeout_secs."
            ),
            EngineError::StepExhausted { .. } | EngineError::Internal(_) => {
                "Something went wrong while processing your message. Please try again.".into()
            }
        }
    }
}
