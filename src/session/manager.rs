//! Session tool-call manager.
//!
//! Front door for all session state the bridge touches, including the
//! reserved `pendingToolCalls` entry that records tool calls awaiting an
//! out-of-band (human) resolution. The pending list behaves as an
//! insertion-ordered set: adding is an ordered union, resolving is a set
//! difference, and resolving an absent ID is a logged no-op.
//!
//! Callers mutate a given conversation only while holding its session lock,
//! so read-modify-write on the pending list is race-free per conversation.

use crate::error::Result;
use crate::session::store::{Session, SessionStore};
use crate::types::{SessionIdentity, StateMap};
use std::sync::Arc;

/// Reserved session state key holding the pending tool-call ID list.
pub const PENDING_TOOL_CALLS_KEY: &str = "pendingToolCalls";

/// Manager over a [`SessionStore`] with pending-tool-call semantics.
#[derive(Clone)]
pub struct SessionToolCallManager {
    store: Arc<dyn SessionStore>,
}

impl SessionToolCallManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Fetch the session, creating it with `initial_state` if absent.
    ///
    /// For an existing session the stored state wins; `initial_state` is
    /// ignored rather than merged.
    pub async fn ensure_session(
        &self,
        identity: &SessionIdentity,
        initial_state: Option<StateMap>,
    ) -> Result<Session> {
        if let Some(session) = self.store.get_session(identity).await? {
            return Ok(session);
        }
        self.store
            .create_session(identity, initial_state.unwrap_or_default())
            .await
    }

    /// Read the current session state (empty map if the session is absent)
    pub async fn read_state(&self, identity: &SessionIdentity) -> Result<StateMap> {
        Ok(self
            .store
            .get_session(identity)
            .await?
            .map(|s| s.state)
            .unwrap_or_default())
    }

    /// Merge a state delta into the session, top-level key by key
    pub async fn apply_delta(&self, identity: &SessionIdentity, delta: &StateMap) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        self.store.append_state_delta(identity, delta).await?;
        Ok(())
    }

    /// Record tool calls awaiting out-of-band resolution.
    ///
    /// Ordered union: existing entries keep their position, new IDs are
    /// appended in the order given, duplicates are dropped. Returns the
    /// updated list.
    pub async fn add_pending_tool_calls(
        &self,
        identity: &SessionIdentity,
        tool_call_ids: &[String],
    ) -> Result<Vec<String>> {
        let mut pending = self.pending_tool_calls(identity).await?;
        let mut changed = false;
        for id in tool_call_ids {
            if !pending.contains(id) {
                pending.push(id.clone());
                changed = true;
            }
        }
        if changed {
            tracing::info!(
                session = %identity,
                added = ?tool_call_ids,
                pending = pending.len(),
                "Recorded pending tool calls"
            );
            self.write_pending(identity, &pending).await?;
        }
        Ok(pending)
    }

    /// Remove tool calls whose results have arrived.
    ///
    /// Set difference, idempotent: an ID not present in the list is logged
    /// and skipped. Returns the updated list.
    pub async fn resolve_pending_tool_calls(
        &self,
        identity: &SessionIdentity,
        tool_call_ids: &[String],
    ) -> Result<Vec<String>> {
        let mut pending = self.pending_tool_calls(identity).await?;
        let mut changed = false;
        for id in tool_call_ids {
            match pending.iter().position(|p| p == id) {
                Some(pos) => {
                    pending.remove(pos);
                    changed = true;
                }
                None => {
                    tracing::warn!(
                        session = %identity,
                        tool_call_id = %id,
                        "Resolving tool call that is not pending, ignoring"
                    );
                }
            }
        }
        if changed {
            self.write_pending(identity, &pending).await?;
        }
        Ok(pending)
    }

    /// Current pending tool-call IDs, in insertion order
    pub async fn pending_tool_calls(&self, identity: &SessionIdentity) -> Result<Vec<String>> {
        let state = self.read_state(identity).await?;
        Ok(Self::parse_pending(&state))
    }

    async fn write_pending(&self, identity: &SessionIdentity, pending: &[String]) -> Result<()> {
        let mut delta = StateMap::new();
        delta.insert(
            PENDING_TOOL_CALLS_KEY.to_string(),
            serde_json::Value::from(pending.to_vec()),
        );
        self.store.append_state_delta(identity, &delta).await?;
        Ok(())
    }

    fn parse_pending(state: &StateMap) -> Vec<String> {
        match state.get(PENDING_TOOL_CALLS_KEY) {
            None => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                tracing::warn!(
                    value = %other,
                    "Malformed pending tool-call entry in session state, treating as empty"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::InMemorySessionStore;
    use crate::types::ConversationId;

    fn manager() -> SessionToolCallManager {
        SessionToolCallManager::new(Arc::new(InMemorySessionStore::new()))
    }

    fn identity() -> SessionIdentity {
        SessionIdentity::new("app", "user", ConversationId::new("conv-1"))
    }

    #[tokio::test]
    async fn test_ensure_session_creates_once() {
        let mgr = manager();
        let id = identity();

        let mut initial = StateMap::new();
        initial.insert("seed".to_string(), serde_json::json!(1));
        mgr.ensure_session(&id, Some(initial)).await.unwrap();

        // Second call with different initial state must not clobber
        let mut other = StateMap::new();
        other.insert("seed".to_string(), serde_json::json!(99));
        let session = mgr.ensure_session(&id, Some(other)).await.unwrap();
        assert_eq!(session.state["seed"], 1);
    }

    #[tokio::test]
    async fn test_add_pending_is_ordered_union() {
        let mgr = manager();
        let id = identity();
        mgr.ensure_session(&id, None).await.unwrap();

        mgr.add_pending_tool_calls(&id, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let pending = mgr
            .add_pending_tool_calls(&id, &["b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(pending, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_add_pending_commutative_as_set() {
        let id = identity();

        let mgr1 = manager();
        mgr1.ensure_session(&id, None).await.unwrap();
        mgr1.add_pending_tool_calls(&id, &["a".to_string()]).await.unwrap();
        let one = mgr1
            .add_pending_tool_calls(&id, &["b".to_string()])
            .await
            .unwrap();

        let mgr2 = manager();
        mgr2.ensure_session(&id, None).await.unwrap();
        mgr2.add_pending_tool_calls(&id, &["b".to_string()]).await.unwrap();
        let two = mgr2
            .add_pending_tool_calls(&id, &["a".to_string()])
            .await
            .unwrap();

        let mut one_sorted = one.clone();
        let mut two_sorted = two.clone();
        one_sorted.sort();
        two_sorted.sort();
        assert_eq!(one_sorted, two_sorted);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let mgr = manager();
        let id = identity();
        mgr.ensure_session(&id, None).await.unwrap();
        mgr.add_pending_tool_calls(&id, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        let first = mgr
            .resolve_pending_tool_calls(&id, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(first, vec!["b"]);

        // Resolving the same ID again is a no-op
        let second = mgr
            .resolve_pending_tool_calls(&id, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(second, vec!["b"]);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_noop() {
        let mgr = manager();
        let id = identity();
        mgr.ensure_session(&id, None).await.unwrap();
        mgr.add_pending_tool_calls(&id, &["a".to_string()]).await.unwrap();

        let pending = mgr
            .resolve_pending_tool_calls(&id, &["ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(pending, vec!["a"]);
    }

    #[tokio::test]
    async fn test_apply_delta_round_trip() {
        let mgr = manager();
        let id = identity();
        mgr.ensure_session(&id, None).await.unwrap();

        let mut delta = StateMap::new();
        delta.insert("phase".to_string(), serde_json::json!("search"));
        mgr.apply_delta(&id, &delta).await.unwrap();

        let state = mgr.read_state(&id).await.unwrap();
        assert_eq!(state["phase"], "search");
    }

    #[tokio::test]
    async fn test_pending_survives_other_deltas() {
        let mgr = manager();
        let id = identity();
        mgr.ensure_session(&id, None).await.unwrap();
        mgr.add_pending_tool_calls(&id, &["a".to_string()]).await.unwrap();

        let mut delta = StateMap::new();
        delta.insert("phase".to_string(), serde_json::json!("done"));
        mgr.apply_delta(&id, &delta).await.unwrap();

        assert_eq!(mgr.pending_tool_calls(&id).await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_malformed_pending_entry_treated_as_empty() {
        let mgr = manager();
        let id = identity();
        mgr.ensure_session(&id, None).await.unwrap();

        let mut delta = StateMap::new();
        delta.insert(
            PENDING_TOOL_CALLS_KEY.to_string(),
            serde_json::json!("not-a-list"),
        );
        mgr.apply_delta(&id, &delta).await.unwrap();

        assert!(mgr.pending_tool_calls(&id).await.unwrap().is_empty());
    }
}
