//! Error types for the Conductor domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; the engine-level
//! taxonomy lives with the pipeline in `conductor-workflow`.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether this failure means the credentials are missing or rejected.
    ///
    /// Some services report bad credentials as a generic API error, so the
    /// message text is inspected as well.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ProviderError::AuthenticationFailed(_) => true,
            ProviderError::ApiError {
                status_code: 401 | 403,
                ..
            } => true,
            ProviderError::ApiError { message, .. } | ProviderError::NotConfigured(message) => {
                let lower = message.to_lowercase();
                ["api key", "unauthorized", "credentials", "authentication"]
                    .iter()
                    .any(|needle| lower.contains(needle))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),
}
