//! Session state and pending tool-call bookkeeping.

pub mod manager;
pub mod store;

pub use manager::{SessionToolCallManager, PENDING_TOOL_CALLS_KEY};
pub use store::{InMemorySessionStore, Session, SessionStore};
