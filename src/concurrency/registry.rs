//! Run registry: process-wide execution bookkeeping.
//!
//! Caps simultaneous in-flight runs, guarantees at most one live run per
//! conversation (a second request awaits the first instead of racing it),
//! reclaims runs abandoned past a staleness timeout, and retains
//! completed-but-unresolved runs so a HITL continuation is recognized as
//! unfinished business.
//!
//! Admission hands out a [`RunTicket`]. The ticket settles the slot on
//! `finish`, and its `Drop` settles it for streams that are dropped mid-run
//! (client disconnect, aborted task), so an abandoned run can never wedge
//! its conversation.
//!
//! Process-local: the per-conversation and capacity guarantees hold within
//! one process only.

use crate::error::{BridgeError, Result};
use crate::types::{RunId, SessionIdentity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
struct RunEntry {
    run_id: RunId,
    started_at: Instant,
    /// Background task driving the run, abortable on staleness.
    /// Aborting a task that already panicked or finished is harmless.
    task: Option<JoinHandle<()>>,
    done_tx: watch::Sender<bool>,
    /// Completed but with tool calls still awaiting external resolution
    awaiting_resolution: bool,
}

impl RunEntry {
    fn is_done(&self) -> bool {
        *self.done_tx.borrow()
    }
}

type EntryMap = Arc<Mutex<HashMap<String, RunEntry>>>;

fn lock_entries(entries: &Mutex<HashMap<String, RunEntry>>) -> MutexGuard<'_, HashMap<String, RunEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Injected registry of in-flight and HITL-retained runs, one slot per
/// conversation.
pub struct RunRegistry {
    entries: EntryMap,
    max_in_flight: usize,
    stale_after: Duration,
}

/// Admission ticket for one run.
///
/// Call [`RunTicket::finish`] at end of run. A ticket dropped unfinished
/// marks its run done and frees the slot, the same way the session lock
/// guard releases on every exit path.
#[derive(Debug)]
pub struct RunTicket {
    entries: EntryMap,
    key: String,
    run_id: RunId,
    settled: bool,
}

impl RunTicket {
    /// Mark the run finished; idempotent.
    ///
    /// A run that ended with pending tool calls is retained (marked
    /// complete) so the next request for the conversation is recognized as
    /// a continuation; otherwise the slot is freed.
    pub fn finish(&mut self, has_pending_tool_calls: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        let mut entries = lock_entries(&self.entries);
        let registered = entries
            .get(&self.key)
            .map(|entry| entry.run_id == self.run_id)
            .unwrap_or(false);
        if !registered {
            // Already reclaimed for staleness; nothing left to settle
            tracing::warn!(
                session = %self.key,
                run_id = %self.run_id,
                "Finishing run that is no longer registered"
            );
            return;
        }

        if has_pending_tool_calls {
            if let Some(entry) = entries.get_mut(&self.key) {
                let _ = entry.done_tx.send(true);
                entry.task = None;
                entry.awaiting_resolution = true;
                tracing::debug!(
                    session = %self.key,
                    run_id = %self.run_id,
                    "Run finished with pending tool calls, retaining"
                );
            }
        } else if let Some(entry) = entries.remove(&self.key) {
            let _ = entry.done_tx.send(true);
        }
    }
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut entries = lock_entries(&self.entries);
        if entries
            .get(&self.key)
            .map(|entry| entry.run_id == self.run_id)
            .unwrap_or(false)
        {
            tracing::warn!(
                session = %self.key,
                run_id = %self.run_id,
                "Run abandoned before completion, releasing its slot"
            );
            if let Some(entry) = entries.remove(&self.key) {
                let _ = entry.done_tx.send(true);
            }
        }
    }
}

impl RunRegistry {
    pub fn new(max_in_flight: usize, stale_after: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            max_in_flight,
            stale_after,
        }
    }

    /// Admit a new run for a conversation.
    ///
    /// If a live run already exists for the conversation, awaits its
    /// completion first rather than racing it; a live run past the
    /// staleness timeout is reclaimed instead of waited on. At capacity,
    /// stale runs are reclaimed; if the registry is still full the run is
    /// rejected with `BUSY` rather than queued.
    pub async fn begin(&self, identity: &SessionIdentity, run_id: &RunId) -> Result<RunTicket> {
        let key = identity.key();

        loop {
            let (live_run, mut done_rx) = {
                let mut entries = lock_entries(&self.entries);
                let live = entries.get(&key).filter(|entry| !entry.is_done()).map(|entry| {
                    (
                        entry.started_at.elapsed() > self.stale_after,
                        entry.run_id.clone(),
                        entry.done_tx.subscribe(),
                    )
                });
                match live {
                    None => break,
                    Some((true, stale_run, _)) => {
                        tracing::warn!(
                            session = %key,
                            run_id = %stale_run,
                            "Reclaiming stale run blocking its conversation"
                        );
                        if let Some(stale) = entries.remove(&key) {
                            if let Some(task) = stale.task {
                                task.abort();
                            }
                            let _ = stale.done_tx.send(true);
                        }
                        continue;
                    }
                    Some((false, live_run, done_rx)) => (live_run, done_rx),
                }
            };
            tracing::info!(
                session = %key,
                in_flight_run = %live_run,
                "Run already in flight for conversation, awaiting its completion"
            );
            while !*done_rx.borrow() {
                // A dropped sender means the entry is gone; that counts as done
                if done_rx.changed().await.is_err() {
                    break;
                }
            }
        }

        let mut entries = lock_entries(&self.entries);
        if Self::live_count(&entries) >= self.max_in_flight {
            Self::reclaim_stale(&mut entries, self.stale_after);
        }
        if Self::live_count(&entries) >= self.max_in_flight {
            return Err(BridgeError::CapacityExhausted {
                max_in_flight: self.max_in_flight,
            });
        }

        if let Some(previous) = entries.get(&key) {
            if previous.awaiting_resolution {
                tracing::info!(
                    session = %key,
                    previous_run = %previous.run_id,
                    run_id = %run_id,
                    "Continuing conversation with unresolved tool calls"
                );
            }
        }

        let (done_tx, _) = watch::channel(false);
        entries.insert(
            key.clone(),
            RunEntry {
                run_id: run_id.clone(),
                started_at: Instant::now(),
                task: None,
                done_tx,
                awaiting_resolution: false,
            },
        );
        Ok(RunTicket {
            entries: self.entries.clone(),
            key,
            run_id: run_id.clone(),
            settled: false,
        })
    }

    /// Attach the background task driving a run, making it abortable on
    /// staleness reclamation.
    pub fn attach_task(&self, identity: &SessionIdentity, task: JoinHandle<()>) {
        let mut entries = lock_entries(&self.entries);
        if let Some(entry) = entries.get_mut(&identity.key()) {
            entry.task = Some(task);
        } else {
            // A rejected request has no entry; its task only emits the
            // terminal error and exits, so it is left to finish on its own.
            tracing::debug!(
                session = %identity,
                "No registered run for task, detaching"
            );
        }
    }

    /// Whether the conversation has a completed run awaiting resolution
    pub fn awaiting_resolution(&self, identity: &SessionIdentity) -> bool {
        lock_entries(&self.entries)
            .get(&identity.key())
            .map(|entry| entry.awaiting_resolution)
            .unwrap_or(false)
    }

    /// Number of live (not yet finished) runs
    pub fn in_flight(&self) -> usize {
        Self::live_count(&lock_entries(&self.entries))
    }

    fn live_count(entries: &HashMap<String, RunEntry>) -> usize {
        entries.values().filter(|entry| !entry.is_done()).count()
    }

    fn reclaim_stale(entries: &mut HashMap<String, RunEntry>, stale_after: Duration) {
        let now = Instant::now();
        let stale_keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| {
                !entry.is_done() && now.duration_since(entry.started_at) > stale_after
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in stale_keys {
            if let Some(entry) = entries.remove(&key) {
                tracing::warn!(
                    session = %key,
                    run_id = %entry.run_id,
                    "Reclaiming stale run"
                );
                if let Some(task) = entry.task {
                    task.abort();
                }
                let _ = entry.done_tx.send(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationId;

    fn identity(conv: &str) -> SessionIdentity {
        SessionIdentity::new("app", "user", ConversationId::new(conv))
    }

    #[tokio::test]
    async fn test_begin_and_finish() {
        let registry = RunRegistry::new(4, Duration::from_secs(60));
        let id = identity("conv-1");

        let mut ticket = registry.begin(&id, &RunId::random()).await.unwrap();
        assert_eq!(registry.in_flight(), 1);

        ticket.finish(false);
        assert_eq!(registry.in_flight(), 0);
        assert!(!registry.awaiting_resolution(&id));
    }

    #[tokio::test]
    async fn test_dropped_ticket_frees_slot() {
        let registry = RunRegistry::new(4, Duration::from_secs(60));
        let id = identity("conv-1");

        let ticket = registry.begin(&id, &RunId::random()).await.unwrap();
        assert_eq!(registry.in_flight(), 1);

        // Abandoned without finish: slot is released on drop
        drop(ticket);
        assert_eq!(registry.in_flight(), 0);

        // And the conversation is immediately admittable again
        let _again = registry.begin(&id, &RunId::random()).await.unwrap();
        assert_eq!(registry.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_capacity_rejects_when_full() {
        let registry = RunRegistry::new(1, Duration::from_secs(60));

        let _held = registry
            .begin(&identity("conv-a"), &RunId::random())
            .await
            .unwrap();
        let err = registry
            .begin(&identity("conv-b"), &RunId::random())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "BUSY");
    }

    #[tokio::test]
    async fn test_stale_run_reclaimed_at_capacity() {
        let registry = RunRegistry::new(1, Duration::from_millis(10));

        let _stale = registry
            .begin(&identity("conv-a"), &RunId::random())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The stale run is reclaimed, freeing the slot
        let _fresh = registry
            .begin(&identity("conv-b"), &RunId::random())
            .await
            .unwrap();
        assert_eq!(registry.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_stale_run_reclaimed_in_wait_loop() {
        let registry = RunRegistry::new(4, Duration::from_millis(10));
        let id = identity("conv-1");

        let _stale = registry.begin(&id, &RunId::random()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Same conversation: the stale live run is reclaimed instead of
        // waited on, so admission returns promptly
        let fresh = tokio::time::timeout(
            Duration::from_secs(1),
            registry.begin(&id, &RunId::random()),
        )
        .await
        .expect("admission should not wait on a stale run");
        let _fresh = fresh.unwrap();
        assert_eq!(registry.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_second_run_awaits_first() {
        let registry = Arc::new(RunRegistry::new(4, Duration::from_secs(60)));
        let id = identity("conv-1");

        let mut first = registry.begin(&id, &RunId::random()).await.unwrap();

        let second = {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move { registry.begin(&id, &RunId::random()).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!second.is_finished());

        first.finish(false);
        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_pending_run_retained_for_continuation() {
        let registry = RunRegistry::new(4, Duration::from_secs(60));
        let id = identity("conv-1");

        let mut ticket = registry.begin(&id, &RunId::random()).await.unwrap();
        ticket.finish(true);

        assert!(registry.awaiting_resolution(&id));
        assert_eq!(registry.in_flight(), 0);

        // The continuation starts a new run in the same slot
        let mut next = registry.begin(&id, &RunId::random()).await.unwrap();
        next.finish(false);
        assert!(!registry.awaiting_resolution(&id));
    }

    #[tokio::test]
    async fn test_retained_run_does_not_count_against_capacity() {
        let registry = RunRegistry::new(1, Duration::from_secs(60));
        let a = identity("conv-a");

        let mut ticket = registry.begin(&a, &RunId::random()).await.unwrap();
        ticket.finish(true);

        let _other = registry
            .begin(&identity("conv-b"), &RunId::random())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_settled_ticket_drop_keeps_retained_entry() {
        let registry = RunRegistry::new(4, Duration::from_secs(60));
        let id = identity("conv-1");

        let mut ticket = registry.begin(&id, &RunId::random()).await.unwrap();
        ticket.finish(true);
        drop(ticket);

        // Drop after finish(true) must not discard the HITL retention
        assert!(registry.awaiting_resolution(&id));
    }
}
