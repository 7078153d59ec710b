//! UI protocol event type definitions.

use crate::types::message::Role;
use serde::{Deserialize, Serialize};

/// UI protocol event.
///
/// The `type` tag is the kind discriminator; on the wire it travels in the
/// SSE `event` field and is stripped from `data` (see the encoder).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgUiEvent {
    // === Lifecycle Events ===
    /// Run started
    #[serde(rename = "RUN_STARTED")]
    RunStarted {
        #[serde(rename = "runId")]
        run_id: String,
        #[serde(rename = "conversationId")]
        conversation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Run finished
    #[serde(rename = "RUN_FINISHED")]
    RunFinished {
        #[serde(rename = "runId")]
        run_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },

    /// Run error (terminal; mutually exclusive with RUN_FINISHED)
    #[serde(rename = "RUN_ERROR")]
    RunError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },

    // === Message Events ===
    /// Text message start
    #[serde(rename = "TEXT_MESSAGE_START")]
    TextMessageStart {
        #[serde(rename = "messageId")]
        message_id: String,
        role: Role,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Text message content chunk
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent {
        #[serde(rename = "messageId")]
        message_id: String,
        delta: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Text message end
    #[serde(rename = "TEXT_MESSAGE_END")]
    TextMessageEnd {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    // === Tool Call Events ===
    /// Tool call start
    #[serde(rename = "TOOL_CALL_START")]
    ToolCallStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolCallName")]
        tool_call_name: String,
        #[serde(rename = "parentMessageId", skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Tool call arguments
    #[serde(rename = "TOOL_CALL_ARGS")]
    ToolCallArgs {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        delta: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Tool call end
    #[serde(rename = "TOOL_CALL_END")]
    ToolCallEnd {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Tool call result
    #[serde(rename = "TOOL_CALL_RESULT")]
    ToolCallResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        result: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    // === State Events ===
    /// Full session state snapshot
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot {
        snapshot: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Incremental state mutation (list of patch operations)
    #[serde(rename = "STATE_DELTA")]
    StateDelta {
        delta: Vec<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Custom event for opaque payloads
    #[serde(rename = "CUSTOM")]
    Custom {
        name: String,
        data: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
}

impl AgUiEvent {
    /// Get the event kind as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            AgUiEvent::RunStarted { .. } => "RUN_STARTED",
            AgUiEvent::RunFinished { .. } => "RUN_FINISHED",
            AgUiEvent::RunError { .. } => "RUN_ERROR",
            AgUiEvent::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            AgUiEvent::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            AgUiEvent::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            AgUiEvent::ToolCallStart { .. } => "TOOL_CALL_START",
            AgUiEvent::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            AgUiEvent::ToolCallEnd { .. } => "TOOL_CALL_END",
            AgUiEvent::ToolCallResult { .. } => "TOOL_CALL_RESULT",
            AgUiEvent::StateSnapshot { .. } => "STATE_SNAPSHOT",
            AgUiEvent::StateDelta { .. } => "STATE_DELTA",
            AgUiEvent::Custom { .. } => "CUSTOM",
        }
    }

    /// Current timestamp in milliseconds as f64
    pub fn now_timestamp() -> f64 {
        chrono::Utc::now().timestamp_millis() as f64
    }

    // === Builder Methods ===

    /// Create a RUN_STARTED event
    pub fn run_started(run_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        AgUiEvent::RunStarted {
            run_id: run_id.into(),
            conversation_id: conversation_id.into(),
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a RUN_FINISHED event
    pub fn run_finished(run_id: impl Into<String>, result: Option<serde_json::Value>) -> Self {
        AgUiEvent::RunFinished {
            run_id: run_id.into(),
            timestamp: Some(Self::now_timestamp()),
            result,
        }
    }

    /// Create a RUN_ERROR event
    pub fn run_error(
        message: impl Into<String>,
        code: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        AgUiEvent::RunError {
            message: message.into(),
            code,
            timestamp: Some(Self::now_timestamp()),
            details,
        }
    }

    /// Create a TEXT_MESSAGE_START event
    pub fn text_message_start(message_id: impl Into<String>, role: Role) -> Self {
        AgUiEvent::TextMessageStart {
            message_id: message_id.into(),
            role,
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a TEXT_MESSAGE_CONTENT event
    pub fn text_message_content(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        AgUiEvent::TextMessageContent {
            message_id: message_id.into(),
            delta: delta.into(),
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a TEXT_MESSAGE_END event
    pub fn text_message_end(message_id: impl Into<String>) -> Self {
        AgUiEvent::TextMessageEnd {
            message_id: message_id.into(),
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a TOOL_CALL_START event
    pub fn tool_call_start(
        tool_call_id: impl Into<String>,
        tool_call_name: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Self {
        AgUiEvent::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id,
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a TOOL_CALL_ARGS event
    pub fn tool_call_args(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        AgUiEvent::ToolCallArgs {
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a TOOL_CALL_END event
    pub fn tool_call_end(tool_call_id: impl Into<String>) -> Self {
        AgUiEvent::ToolCallEnd {
            tool_call_id: tool_call_id.into(),
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a TOOL_CALL_RESULT event
    pub fn tool_call_result(tool_call_id: impl Into<String>, result: serde_json::Value) -> Self {
        AgUiEvent::ToolCallResult {
            tool_call_id: tool_call_id.into(),
            result,
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a STATE_SNAPSHOT event
    pub fn state_snapshot(snapshot: serde_json::Value) -> Self {
        AgUiEvent::StateSnapshot {
            snapshot,
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a STATE_DELTA event
    pub fn state_delta(delta: Vec<serde_json::Value>) -> Self {
        AgUiEvent::StateDelta {
            delta,
            timestamp: Some(Self::now_timestamp()),
        }
    }

    /// Create a CUSTOM event
    pub fn custom(name: impl Into<String>, data: serde_json::Value) -> Self {
        AgUiEvent::Custom {
            name: name.into(),
            data,
            timestamp: Some(Self::now_timestamp()),
        }
    }
}
