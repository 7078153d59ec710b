//! Session persistence.

use crate::error::{BridgeError, Result};
use crate::types::{SessionIdentity, StateMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One conversation session: identity plus a JSON-object state bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub identity: SessionIdentity,
    pub state: StateMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: SessionIdentity, state: StateMap) -> Self {
        let now = Utc::now();
        Self {
            identity,
            state,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Session persistence backend.
///
/// `create_session` never overwrites: creating an identity that already
/// exists returns the stored session untouched. `append_state_delta` merges
/// top-level keys atomically with respect to other calls on the same store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, identity: &SessionIdentity) -> Result<Option<Session>>;

    async fn create_session(
        &self,
        identity: &SessionIdentity,
        initial_state: StateMap,
    ) -> Result<Session>;

    async fn append_state_delta(
        &self,
        identity: &SessionIdentity,
        delta: &StateMap,
    ) -> Result<Session>;
}

/// In-memory session store keyed by the full session identity.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(&self, identity: &SessionIdentity) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(&identity.key()).cloned())
    }

    async fn create_session(
        &self,
        identity: &SessionIdentity,
        initial_state: StateMap,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&identity.key()) {
            tracing::debug!(session = %identity, "Session already exists, keeping stored state");
            return Ok(existing.clone());
        }
        let session = Session::new(identity.clone(), initial_state);
        sessions.insert(identity.key(), session.clone());
        tracing::debug!(session = %identity, "Created session");
        Ok(session)
    }

    async fn append_state_delta(
        &self,
        identity: &SessionIdentity,
        delta: &StateMap,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&identity.key()).ok_or_else(|| {
            BridgeError::Internal(anyhow::anyhow!("session not found: {}", identity))
        })?;
        for (key, value) in delta {
            session.state.insert(key.clone(), value.clone());
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }
}
