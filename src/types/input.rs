//! Inbound request payload.

use crate::types::message::Message;
use crate::types::StateMap;
use serde::{Deserialize, Serialize};

/// Input for one agent run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    /// Conversation this request belongs to
    pub conversation_id: String,

    /// User issuing the request (falls back to the configured default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Ordered role-tagged messages; the last one decides the input mode
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Caller-supplied initial state, applied only when the session is created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<StateMap>,
}

impl RunAgentInput {
    /// Create a new input for a conversation
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: None,
            messages: Vec::new(),
            initial_state: None,
        }
    }

    /// Set the user ID
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add a message
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the initial state
    pub fn initial_state(mut self, state: StateMap) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// The last message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::Role;

    #[test]
    fn test_input_builder() {
        let input = RunAgentInput::new("conv-1")
            .user_id("user-1")
            .message(Message::user("hello"));

        assert_eq!(input.conversation_id, "conv-1");
        assert_eq!(input.user_id, Some("user-1".to_string()));
        assert_eq!(input.messages.len(), 1);
        assert_eq!(input.last_message().unwrap().role, Role::User);
    }

    #[test]
    fn test_input_serialization() {
        let input = RunAgentInput::new("conv-1").message(Message::user("hi"));
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["conversationId"], "conv-1");
        assert!(json.get("userId").is_none());
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_input_deserialization_defaults() {
        let json = r#"{ "conversationId": "conv-2" }"#;
        let input: RunAgentInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.conversation_id, "conv-2");
        assert!(input.messages.is_empty());
        assert!(input.initial_state.is_none());
    }
}
