//! Error types for the bridge.

use thiserror::Error;

/// Bridge error taxonomy.
///
/// Distinct codes let a client distinguish retry-later (`LOCKED`, `BUSY`)
/// from fix-your-request (`NO_TOOL_RESULTS`, `INVALID_INPUT`) from run-failed
/// (`EXECUTION_ERROR`).
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Conversation lock could not be acquired within the retry budget
    #[error("Conversation busy: {conversation_id}")]
    Locked { conversation_id: String },

    /// Tool-result submission with no extractable result
    #[error("No tool results in submission")]
    NoToolResults,

    /// Request payload unusable (e.g. no user message)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// In-flight run ceiling reached, even after stale-run reclamation
    #[error("Run capacity exhausted ({max_in_flight} in flight)")]
    CapacityExhausted { max_in_flight: usize },

    /// Agent execution failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Get the protocol error code for RUN_ERROR events
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Locked { .. } => "LOCKED",
            BridgeError::NoToolResults => "NO_TOOL_RESULTS",
            BridgeError::InvalidInput(_) => "INVALID_INPUT",
            BridgeError::CapacityExhausted { .. } => "BUSY",
            BridgeError::Execution(_) => "EXECUTION_ERROR",
            BridgeError::Internal(_) => "INTERNAL_ERROR",
            BridgeError::Serialization(_) => "ENCODING_ERROR",
        }
    }

    /// Create error details for RUN_ERROR events
    pub fn to_error_details(&self) -> Option<serde_json::Value> {
        match self {
            BridgeError::Locked { conversation_id } => Some(serde_json::json!({
                "conversationId": conversation_id
            })),
            BridgeError::CapacityExhausted { max_in_flight } => Some(serde_json::json!({
                "maxInFlight": max_in_flight
            })),
            _ => None,
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
