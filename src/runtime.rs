//! Agent runtime interface.
//!
//! The bridge does not construct agents itself; it drives an
//! [`AgentRuntime`] collaborator that yields an ordered stream of
//! [`AgentEvent`]s per run. The translator consumes these events and produces
//! the UI protocol stream.

use crate::error::Result;
use crate::types::{ConversationId, Role, StateMap};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// One content part of an agent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Text content, streamed or complete
    Text { text: String },
    /// A tool invocation reported by the runtime
    FunctionCall {
        id: String,
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// The result of a previously reported tool invocation
    FunctionResponse {
        id: String,
        name: String,
        #[serde(default)]
        response: serde_json::Value,
    },
}

/// One event in the agent execution stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    /// Author of the event (agent name, "user", ...)
    pub author: String,

    /// Content parts carried by this event
    #[serde(default)]
    pub parts: Vec<Part>,

    /// True while text is still streaming for this author
    #[serde(default)]
    pub partial: bool,

    /// True on the run's final event
    #[serde(default)]
    pub is_final_response: bool,

    /// Tool-call IDs the runtime will not wait on.
    /// Populated only on the final event.
    #[serde(default)]
    pub long_running_tool_ids: Vec<String>,

    /// Incremental session state mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_delta: Option<StateMap>,

    /// Extra metadata payload, forwarded opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<serde_json::Value>,
}

impl AgentEvent {
    /// A streaming (partial) text chunk
    pub fn text_chunk(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            parts: vec![Part::Text { text: text.into() }],
            partial: true,
            ..Default::default()
        }
    }

    /// A complete (non-partial) text event
    pub fn text_complete(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            parts: vec![Part::Text { text: text.into() }],
            partial: false,
            ..Default::default()
        }
    }

    /// A function-call event
    pub fn function_call(
        author: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            author: author.into(),
            parts: vec![Part::FunctionCall {
                id: id.into(),
                name: name.into(),
                args,
            }],
            ..Default::default()
        }
    }

    /// A function-response event
    pub fn function_response(
        author: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        response: serde_json::Value,
    ) -> Self {
        Self {
            author: author.into(),
            parts: vec![Part::FunctionResponse {
                id: id.into(),
                name: name.into(),
                response,
            }],
            ..Default::default()
        }
    }

    /// Mark this event as the run's final response
    pub fn finalized(mut self) -> Self {
        self.is_final_response = true;
        self.partial = false;
        self
    }

    /// Set the long-running tool-call IDs (only meaningful on the final event)
    pub fn with_long_running(mut self, ids: Vec<String>) -> Self {
        self.long_running_tool_ids = ids;
        self
    }

    /// Set the state delta
    pub fn with_state_delta(mut self, delta: StateMap) -> Self {
        self.state_delta = Some(delta);
        self
    }

    /// Set the custom metadata payload
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.custom_metadata = Some(metadata);
        self
    }
}

/// The resolved input message handed to the runtime for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    /// Role of the input (user for fresh messages, tool for continuations)
    pub role: Role,
    /// Content parts
    pub parts: Vec<Part>,
}

impl NewMessage {
    /// A fresh user text message
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// A tool-result continuation message
    pub fn tool_results(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Tool,
            parts,
        }
    }
}

/// Agent runtime collaborator.
///
/// `run` starts one execution against one input and returns the ordered
/// event stream for that run. Implementations decide how the run suspends on
/// long-running tool calls; the bridge only reads the flags on the events.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(
        &self,
        user_id: &str,
        conversation_id: &ConversationId,
        input: NewMessage,
    ) -> Result<BoxStream<'static, AgentEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_chunk_builder() {
        let event = AgentEvent::text_chunk("assistant", "Hel");
        assert!(event.partial);
        assert!(!event.is_final_response);
        assert_eq!(event.parts.len(), 1);
    }

    #[test]
    fn test_finalized_clears_partial() {
        let event = AgentEvent::text_chunk("assistant", "done").finalized();
        assert!(!event.partial);
        assert!(event.is_final_response);
    }

    #[test]
    fn test_part_serialization() {
        let part = Part::FunctionCall {
            id: "call_1".to_string(),
            name: "search".to_string(),
            args: serde_json::json!({"q": "rust"}),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "function_call");
        assert_eq!(json["name"], "search");
    }

    #[test]
    fn test_event_deserialization_defaults() {
        let json = r#"{ "author": "agent" }"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.author, "agent");
        assert!(event.parts.is_empty());
        assert!(!event.partial);
        assert!(event.long_running_tool_ids.is_empty());
    }
}
