//! Per-conversation session lock.
//!
//! Short-lived mutual exclusion over the synchronous request path of one
//! conversation, held from lock acquisition until the request's terminal
//! event. Distinct from the run registry, which governs the long-lived
//! execution's identity and the process-wide ceiling.

use crate::error::{BridgeError, Result};
use crate::types::SessionIdentity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Injected map of per-conversation locks.
///
/// Process-local: multi-process deployments need an external lock service
/// for the exclusion guarantee to hold across processes.
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    retry_count: u32,
    retry_interval: Duration,
}

/// Held conversation lock; releases on drop.
#[derive(Debug)]
pub struct SessionLockGuard {
    _guard: OwnedMutexGuard<()>,
    key: String,
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        tracing::debug!(session = %self.key, "Released session lock");
    }
}

impl SessionLockMap {
    /// Create a lock map with the given retry budget.
    ///
    /// `retry_count` is the total number of acquisition attempts (minimum
    /// one); `retry_interval` the fixed pause between attempts.
    pub fn new(retry_count: u32, retry_interval: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            retry_count: retry_count.max(1),
            retry_interval,
        }
    }

    /// Acquire the lock for a conversation, retrying within the budget.
    ///
    /// Exhausting the budget yields [`BridgeError::Locked`]; the lock was
    /// never held, so there is nothing to release.
    pub async fn acquire(&self, identity: &SessionIdentity) -> Result<SessionLockGuard> {
        let key = identity.key();
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        for attempt in 1..=self.retry_count {
            match lock.clone().try_lock_owned() {
                Ok(guard) => {
                    tracing::debug!(session = %key, attempt, "Acquired session lock");
                    return Ok(SessionLockGuard { _guard: guard, key });
                }
                Err(_) if attempt < self.retry_count => {
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(_) => {}
            }
        }

        tracing::warn!(
            session = %key,
            attempts = self.retry_count,
            "Session lock acquisition exhausted retries"
        );
        Err(BridgeError::Locked {
            conversation_id: identity.conversation_id.to_string(),
        })
    }

    /// Number of conversations with an allocated lock slot
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
