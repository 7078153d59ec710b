//! SSE (Server-Sent Events) encoder for UI protocol events.

use crate::events::AgUiEvent;

/// One encoded wire frame.
///
/// `data` holds the event fields serialized as JSON with the kind
/// discriminator removed; the kind travels in `event`. `id` is a fresh
/// unique token per frame, meant for client-side dedup, not ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub id: String,
    pub event: &'static str,
    pub data: String,
}

impl SseFrame {
    /// Format as an SSE wire block
    pub fn to_sse(&self) -> String {
        format!("id: {}\nevent: {}\ndata: {}\n\n", self.id, self.event, self.data)
    }
}

/// Encoder from [`AgUiEvent`] to [`SseFrame`].
#[derive(Debug, Clone, Default)]
pub struct EventEncoder;

impl EventEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode an event, failing on serialization errors.
    pub fn try_encode(&self, event: &AgUiEvent) -> Result<SseFrame, serde_json::Error> {
        let mut value = serde_json::to_value(event)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("type");
        }
        let data = serde_json::to_string(&value)?;

        Ok(SseFrame {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.event_type(),
            data,
        })
    }

    /// Encode an event, substituting a synthesized error frame on failure.
    ///
    /// The stream is never silently truncated: a frame that cannot be
    /// serialized is replaced by a RUN_ERROR frame of identical shape.
    pub fn encode(&self, event: &AgUiEvent) -> SseFrame {
        match self.try_encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    event_type = event.event_type(),
                    error = %e,
                    "Failed to encode event, substituting error frame"
                );
                let substitute = AgUiEvent::run_error(
                    format!("failed to encode {} event", event.event_type()),
                    Some("ENCODING_ERROR".to_string()),
                    None,
                );
                // A RUN_ERROR with plain string fields always serializes.
                self.try_encode(&substitute).unwrap_or(SseFrame {
                    id: uuid::Uuid::new_v4().to_string(),
                    event: "RUN_ERROR",
                    data: r#"{"message":"encoding failed","code":"ENCODING_ERROR"}"#.to_string(),
                })
            }
        }
    }
}

/// Encode a comment for SSE keep-alive
pub fn encode_comment(comment: &str) -> String {
    format!(": {}\n\n", comment)
}

/// Encode a retry directive for SSE
pub fn encode_retry(milliseconds: u32) -> String {
    format!("retry: {}\n\n", milliseconds)
}
