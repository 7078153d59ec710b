//! Core type definitions: IDs, identity, messages, request input.

pub mod identity;
pub mod ids;
pub mod input;
pub mod message;

pub use identity::SessionIdentity;
pub use ids::{ConversationId, MessageId, RunId};
pub use input::RunAgentInput;
pub use message::{Message, Role};

/// Key-value session state mapping, the only durable shared resource.
pub type StateMap = serde_json::Map<String, serde_json::Value>;
