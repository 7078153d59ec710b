//! Bridge between an agent runtime's execution stream and the AG-UI event
//! protocol, with human-in-the-loop tool-call approval.
//!
//! One request flows: conversation lock → input resolution (fresh user
//! message vs. tool-result continuation) → run admission → agent events
//! translated to UI protocol events → unresolved tool calls persisted to the
//! session's pending set → terminal event → lock release. Events encode to
//! SSE frames for the wire.
//!
//! # Architecture
//!
//! - [`handler::BridgeHandler`]: per-request orchestration
//! - [`events::StreamTranslator`]: stateful agent-event to UI-event translation
//! - [`session::SessionToolCallManager`]: session state and pending tool calls
//! - [`concurrency::SessionLockMap`] / [`concurrency::RunRegistry`]:
//!   per-conversation exclusion and process-wide run bookkeeping
//! - [`runtime::AgentRuntime`]: the injected agent execution collaborator

pub mod concurrency;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod runtime;
pub mod session;
pub mod types;

pub use concurrency::{RunRegistry, RunTicket, SessionLockMap};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use events::{AgUiEvent, EventEncoder, SseFrame, StreamTranslator};
pub use handler::{BridgeHandler, EventHook, HookAction, InputHook, RunHooks};
pub use runtime::{AgentEvent, AgentRuntime, NewMessage, Part};
pub use session::{InMemorySessionStore, SessionStore, SessionToolCallManager};
pub use types::{ConversationId, Message, Role, RunAgentInput, RunId, SessionIdentity, StateMap};
