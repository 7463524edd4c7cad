//! Session store: durable conversation history, owned outside the engine.
//!
//! The engine reads a session's history before a request and hands back the
//! updated history afterwards. It never depends on a save succeeding.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::message::Message;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A human-readable name for this store.
    fn name(&self) -> &str;

    /// Load a session's conversation history (empty for unknown sessions).
    async fn load(&self, session_id: &str) -> Result<Vec<Message>, SessionError>;

    /// Replace a session's conversation history.
    async fn save(&self, session_id: &str, history: &[Message]) -> Result<(), SessionError>;

    /// Forget a session. Returns whether it existed.
    async fn clear(&self, session_id: &str) -> Result<bool, SessionError>;
}

/// An in-memory store. Useful for tests and for the interactive CLI,
/// where history only needs to outlive a single request.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions currently held.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Message>, SessionError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, history: &[Message]) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), history.to_vec());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }
}
