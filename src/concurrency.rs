//! Concurrency control: per-conversation locking and run bookkeeping.

pub mod lock;
pub mod registry;

pub use lock::{SessionLockGuard, SessionLockMap};
pub use registry::{RunRegistry, RunTicket};
