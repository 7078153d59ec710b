//! Streaming event translator.
//!
//! Stateful per-run converter from agent events to UI protocol events. One
//! translator instance exists per run and owns all streaming-boundary state:
//! open text lanes (one per author), the transient tool-call record and the
//! long-running ID set.
//!
//! Framing guarantees:
//! - at most one open text lane per author, exact-once start/end pairing;
//!   an end event is never emitted without a matching start
//! - every previously unseen function call is framed as an atomic
//!   start→args→end triple
//! - function responses become result events unless the call ID was flagged
//!   long-running, in which case the result is suppressed (the HITL path
//!   delivers it instead)

use crate::error::Result;
use crate::events::AgUiEvent;
use crate::runtime::{AgentEvent, Part};
use crate::types::{MessageId, Role, RunId, StateMap};
use std::collections::{HashMap, HashSet};

/// Translator for one run's agent event sequence.
pub struct StreamTranslator {
    run_id: RunId,
    /// Open text lane per author (exists only mid-stream)
    open_messages: HashMap<String, MessageId>,
    /// Tool-call ID → tool name, held until the result arrives
    tool_call_names: HashMap<String, String>,
    /// Call IDs the runtime will not wait on; results are suppressed
    long_running_ids: HashSet<String>,
}

impl StreamTranslator {
    /// Create a translator for a run
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            open_messages: HashMap::new(),
            tool_call_names: HashMap::new(),
            long_running_ids: HashSet::new(),
        }
    }

    /// Get the run ID
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Translate one agent event into zero or more UI events.
    ///
    /// A failure interpreting one event is logged and yields no events;
    /// translation continues with the next event.
    pub fn translate(&mut self, event: &AgentEvent) -> Vec<AgUiEvent> {
        match self.translate_inner(event) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    run_id = %self.run_id,
                    author = %event.author,
                    error = %e,
                    "Failed to translate agent event, skipping"
                );
                Vec::new()
            }
        }
    }

    fn translate_inner(&mut self, event: &AgentEvent) -> Result<Vec<AgUiEvent>> {
        let mut out = Vec::new();

        // Long-running IDs are reported only on the final event; some
        // runtimes mention the calls themselves only there too, hence the
        // set is recorded before the parts are walked.
        if event.is_final_response {
            self.long_running_ids
                .extend(event.long_running_tool_ids.iter().cloned());
        }

        for part in &event.parts {
            match part {
                Part::Text { text } => {
                    self.translate_text(&event.author, text, event.partial, &mut out)
                }
                Part::FunctionCall { id, name, args } => {
                    // clean framing before switching to tool-call context
                    out.extend(self.force_close());
                    self.translate_function_call(id, name, args, &mut out)?;
                }
                Part::FunctionResponse { id, response, .. } => {
                    out.extend(self.force_close());
                    self.translate_function_response(id, response, &mut out);
                }
            }
        }

        if let Some(delta) = &event.state_delta {
            if !delta.is_empty() {
                out.push(Self::state_delta_event(delta));
            }
        }

        if let Some(metadata) = &event.custom_metadata {
            out.push(AgUiEvent::custom("agent_metadata", metadata.clone()));
        }

        Ok(out)
    }

    fn translate_text(&mut self, author: &str, text: &str, partial: bool, out: &mut Vec<AgUiEvent>) {
        if text.is_empty() {
            return;
        }
        let role = if author == "user" {
            Role::User
        } else {
            Role::Assistant
        };

        if partial {
            let message_id = match self.open_messages.get(author) {
                Some(id) => id.clone(),
                None => {
                    let id = MessageId::random();
                    self.open_messages.insert(author.to_string(), id.clone());
                    out.push(AgUiEvent::text_message_start(id.as_str(), role));
                    id
                }
            };
            out.push(AgUiEvent::text_message_content(message_id.as_str(), text));
        } else if let Some(message_id) = self.open_messages.remove(author) {
            // Final chunk of an open lane. Its text aggregates what already
            // streamed, so only the end event is needed.
            out.push(AgUiEvent::text_message_end(message_id.as_str()));
        } else {
            // Final chunk with no prior open lane: synthesize the full triple.
            let id = MessageId::random();
            out.push(AgUiEvent::text_message_start(id.as_str(), role));
            out.push(AgUiEvent::text_message_content(id.as_str(), text));
            out.push(AgUiEvent::text_message_end(id.as_str()));
        }
    }

    fn translate_function_call(
        &mut self,
        id: &str,
        name: &str,
        args: &serde_json::Value,
        out: &mut Vec<AgUiEvent>,
    ) -> Result<()> {
        let seen = self.tool_call_names.contains_key(id);
        if seen && !self.long_running_ids.contains(id) {
            // Already framed inline; only long-running calls are re-emitted
            // from the final event.
            return Ok(());
        }
        self.tool_call_names.insert(id.to_string(), name.to_string());

        let args_json = if args.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string(args)?
        };

        out.push(AgUiEvent::tool_call_start(id, name, None));
        out.push(AgUiEvent::tool_call_args(id, args_json));
        out.push(AgUiEvent::tool_call_end(id));
        Ok(())
    }

    fn translate_function_response(
        &mut self,
        id: &str,
        response: &serde_json::Value,
        out: &mut Vec<AgUiEvent>,
    ) {
        if self.long_running_ids.contains(id) {
            tracing::debug!(
                run_id = %self.run_id,
                tool_call_id = id,
                "Suppressing result for long-running tool call"
            );
            return;
        }
        self.tool_call_names.remove(id);
        out.push(AgUiEvent::tool_call_result(id, response.clone()));
    }

    /// Close every open text lane, emitting one end event each.
    ///
    /// Invoked before tool-call events and at run end so the client never
    /// observes a dangling message across a context switch.
    pub fn force_close(&mut self) -> Vec<AgUiEvent> {
        self.open_messages
            .drain()
            .map(|(_, message_id)| AgUiEvent::text_message_end(message_id.as_str()))
            .collect()
    }

    /// Number of currently open text lanes
    pub fn open_lane_count(&self) -> usize {
        self.open_messages.len()
    }

    /// Whether a call ID was flagged long-running
    pub fn is_long_running(&self, tool_call_id: &str) -> bool {
        self.long_running_ids.contains(tool_call_id)
    }

    fn state_delta_event(delta: &StateMap) -> AgUiEvent {
        let ops = delta
            .iter()
            .map(|(key, value)| {
                serde_json::json!({
                    "op": "add",
                    "path": format!("/{}", key),
                    "value": value,
                })
            })
            .collect();
        AgUiEvent::state_delta(ops)
    }
}
