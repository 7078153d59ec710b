//! Bridge request handler.
//!
//! `BridgeHandler` orchestrates one request end to end: conversation lock,
//! input resolution, run admission, translated event streaming, pending
//! tool-call reconciliation and terminal events. Every handled failure still
//! produces a well-formed terminal event; no exit path leaves the lock held
//! or the registry inconsistent.

use crate::concurrency::{RunRegistry, SessionLockMap};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::{AgUiEvent, EventEncoder, SseFrame, StreamTranslator};
use crate::runtime::{AgentRuntime, NewMessage, Part};
use crate::session::{SessionStore, SessionToolCallManager};
use crate::types::{ConversationId, Role, RunAgentInput, RunId, SessionIdentity};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// What an event hook asks the orchestrator to do with one event.
#[derive(Debug)]
pub enum HookAction {
    /// Emit the event unchanged
    Keep,
    /// Emit a substitute event instead
    Replace(AgUiEvent),
    /// Drop the event
    Skip,
    /// Emit the event, then stop consuming the run for this request.
    /// Open lanes are still closed and outstanding calls still reconciled.
    Retune,
}

/// Inspect or rewrite each translated event before emission.
#[async_trait]
pub trait EventHook: Send + Sync {
    async fn on_event(&self, event: &AgUiEvent) -> HookAction;
}

/// Rewrite the resolved input message before the run starts.
#[async_trait]
pub trait InputHook: Send + Sync {
    async fn on_input(&self, input: NewMessage) -> NewMessage;
}

/// Optional per-stage interception points, each defaulting to pass-through.
#[derive(Clone, Default)]
pub struct RunHooks {
    pub event: Option<Arc<dyn EventHook>>,
    pub input: Option<Arc<dyn InputHook>>,
}

/// The run input resolved from an inbound request.
#[derive(Debug)]
enum ResolvedInput {
    /// Latest user message starts a fresh turn
    Fresh(NewMessage),
    /// Trailing tool messages continue a suspended run
    ToolResults {
        message: NewMessage,
        resolved_ids: Vec<String>,
    },
}

/// Handler for bridge run requests.
pub struct BridgeHandler {
    runtime: Arc<dyn AgentRuntime>,
    sessions: SessionToolCallManager,
    locks: Arc<SessionLockMap>,
    registry: Arc<RunRegistry>,
    config: BridgeConfig,
    encoder: EventEncoder,
    hooks: RunHooks,
}

impl BridgeHandler {
    /// Create a handler over explicitly injected services.
    ///
    /// The lock map and registry live as long as the process (or test)
    /// constructing them; sharing one pair across handlers is what makes
    /// their guarantees process-wide.
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        store: Arc<dyn SessionStore>,
        locks: Arc<SessionLockMap>,
        registry: Arc<RunRegistry>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            runtime,
            sessions: SessionToolCallManager::new(store),
            locks,
            registry,
            config,
            encoder: EventEncoder::new(),
            hooks: RunHooks::default(),
        }
    }

    /// Create a handler whose lock map and registry are built from `config`,
    /// so the concurrency limits in effect are the configured ones.
    pub fn from_config(
        runtime: Arc<dyn AgentRuntime>,
        store: Arc<dyn SessionStore>,
        config: BridgeConfig,
    ) -> Self {
        let locks = Arc::new(SessionLockMap::new(
            config.lock_retry_count,
            Duration::from_millis(config.lock_retry_interval_ms),
        ));
        let registry = Arc::new(RunRegistry::new(
            config.max_in_flight_runs,
            Duration::from_secs(config.run_stale_after_sec),
        ));
        Self::new(runtime, store, locks, registry, config)
    }

    /// Replace the hook set
    pub fn with_hooks(mut self, hooks: RunHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Get the session manager
    pub fn sessions(&self) -> &SessionToolCallManager {
        &self.sessions
    }

    /// Get the event encoder
    pub fn encoder(&self) -> &EventEncoder {
        &self.encoder
    }

    /// Run the agent for one request and stream the translated events.
    ///
    /// The conversation lock is held from here until the returned stream is
    /// exhausted or dropped. Rejections (lock contention, capacity) surface
    /// as a single terminal error event, never as a bare failure.
    pub async fn run_agent(
        &self,
        input: RunAgentInput,
    ) -> Pin<Box<dyn Stream<Item = AgUiEvent> + Send>> {
        let identity = self.identity_for(&input);
        let run_id = RunId::random();

        let guard = match self.locks.acquire(&identity).await {
            Ok(guard) => guard,
            Err(e) => return Self::rejection_stream(e),
        };

        let mut ticket = match self.registry.begin(&identity, &run_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                drop(guard);
                return Self::rejection_stream(e);
            }
        };

        let runtime = self.runtime.clone();
        let sessions = self.sessions.clone();
        let hooks = self.hooks.clone();

        let stream = stream! {
            // Guard and ticket live for the whole stream. Both settle on any
            // exit: the guard by its own Drop, the ticket by finish on the
            // explicit paths and by its Drop if the stream is abandoned.
            let _lock = guard;

            // RESOLVE_INPUT
            let resolved = match Self::resolve_input(&input) {
                Ok(resolved) => resolved,
                Err(e) => {
                    ticket.finish(false);
                    yield Self::terminal_error(&e);
                    return;
                }
            };

            // ENSURE_SESSION
            if let Err(e) = sessions
                .ensure_session(&identity, input.initial_state.clone())
                .await
            {
                ticket.finish(false);
                yield Self::terminal_error(&e);
                return;
            }

            let (mut message, resolved_ids) = match resolved {
                ResolvedInput::Fresh(message) => (message, Vec::new()),
                ResolvedInput::ToolResults {
                    message,
                    resolved_ids,
                } => (message, resolved_ids),
            };

            if !resolved_ids.is_empty() {
                if let Err(e) = sessions
                    .resolve_pending_tool_calls(&identity, &resolved_ids)
                    .await
                {
                    ticket.finish(false);
                    yield Self::terminal_error(&e);
                    return;
                }
            }

            if let Some(hook) = &hooks.input {
                message = hook.on_input(message).await;
            }

            // EMIT_RUN_STARTED
            yield AgUiEvent::run_started(
                run_id.as_str(),
                identity.conversation_id.as_str(),
            );

            let mut agent_stream = match runtime
                .run(&identity.user_id, &identity.conversation_id, message)
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    ticket.finish(false);
                    yield Self::terminal_error(&e);
                    return;
                }
            };

            // STREAM_TRANSLATED_EVENTS
            let mut translator = StreamTranslator::new(run_id.clone());
            let mut outstanding: Vec<String> = Vec::new();

            'streaming: while let Some(agent_event) = agent_stream.next().await {
                if let Some(delta) = &agent_event.state_delta {
                    if let Err(e) = sessions.apply_delta(&identity, delta).await {
                        for event in translator.force_close() {
                            yield event;
                        }
                        let has_pending =
                            Self::reconcile(&sessions, &identity, &outstanding).await;
                        ticket.finish(has_pending);
                        yield Self::terminal_error(&e);
                        return;
                    }
                }

                // A final event announcing long-running calls means the
                // agent genuinely suspended; nothing more arrives this turn.
                let suspend = agent_event.is_final_response
                    && !agent_event.long_running_tool_ids.is_empty();

                for event in translator.translate(&agent_event) {
                    match &event {
                        AgUiEvent::ToolCallStart { tool_call_id, .. } => {
                            if !outstanding.contains(tool_call_id) {
                                outstanding.push(tool_call_id.clone());
                            }
                        }
                        AgUiEvent::ToolCallResult { tool_call_id, .. } => {
                            outstanding.retain(|id| id != tool_call_id);
                        }
                        _ => {}
                    }

                    match &hooks.event {
                        None => yield event,
                        Some(hook) => match hook.on_event(&event).await {
                            HookAction::Keep => yield event,
                            HookAction::Replace(substitute) => yield substitute,
                            HookAction::Skip => {}
                            HookAction::Retune => {
                                tracing::info!(
                                    run_id = %run_id,
                                    "Event hook requested retune, stopping stream consumption"
                                );
                                yield event;
                                break 'streaming;
                            }
                        },
                    }
                }

                if suspend {
                    tracing::info!(
                        run_id = %run_id,
                        session = %identity,
                        long_running = ?agent_event.long_running_tool_ids,
                        "Run suspended on long-running tool calls"
                    );
                    break;
                }
            }

            for event in translator.force_close() {
                yield event;
            }

            // RECONCILE_PENDING_CALLS
            let has_pending = Self::reconcile(&sessions, &identity, &outstanding).await;
            ticket.finish(has_pending);

            match sessions.read_state(&identity).await {
                Ok(state) => {
                    yield AgUiEvent::state_snapshot(serde_json::Value::Object(state));
                }
                Err(e) => {
                    tracing::warn!(
                        session = %identity,
                        error = %e,
                        "Failed to read state for snapshot, skipping"
                    );
                }
            }

            // EMIT_RUN_FINISHED
            yield AgUiEvent::run_finished(run_id.as_str(), None);
        };

        Box::pin(stream)
    }

    /// Run the agent and stream encoded SSE frames.
    pub async fn run_agent_sse(
        &self,
        input: RunAgentInput,
    ) -> Pin<Box<dyn Stream<Item = SseFrame> + Send>> {
        let encoder = self.encoder.clone();
        let events = self.run_agent(input).await;
        Box::pin(events.map(move |event| encoder.encode(&event)))
    }

    /// Run the agent on a background task, returning the frame stream.
    ///
    /// The task handle is owned by the run registry, which aborts it if the
    /// run goes stale. Dropping the stream stops the task at its next send.
    pub async fn spawn_run(&self, input: RunAgentInput) -> ReceiverStream<SseFrame> {
        let identity = self.identity_for(&input);
        let mut frames = self.run_agent_sse(input).await;
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });
        self.registry.attach_task(&identity, task);
        ReceiverStream::new(rx)
    }

    fn identity_for(&self, input: &RunAgentInput) -> SessionIdentity {
        let user_id = input
            .user_id
            .clone()
            .unwrap_or_else(|| self.config.default_user_id.clone());
        SessionIdentity::new(
            self.config.app_name.clone(),
            user_id,
            ConversationId::new(input.conversation_id.clone()),
        )
    }

    /// Resolve the run input from the request payload.
    ///
    /// A trailing block of tool messages is a tool-result continuation; each
    /// result that fails to parse degrades to a structured parse-error
    /// result rather than aborting the submission. Anything else takes the
    /// latest user message as a fresh turn.
    fn resolve_input(input: &RunAgentInput) -> Result<ResolvedInput> {
        let last = input
            .messages
            .last()
            .ok_or_else(|| BridgeError::InvalidInput("empty message list".to_string()))?;

        if last.role != Role::Tool {
            let user = input
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .ok_or_else(|| BridgeError::InvalidInput("no user message".to_string()))?;
            return Ok(ResolvedInput::Fresh(NewMessage::user_text(
                user.content.clone(),
            )));
        }

        let mut trailing: Vec<_> = input
            .messages
            .iter()
            .rev()
            .take_while(|m| m.role == Role::Tool)
            .collect();
        trailing.reverse();

        let mut parts = Vec::new();
        let mut resolved_ids = Vec::new();
        for message in trailing {
            let tool_call_id = match &message.tool_call_id {
                Some(id) => id.clone(),
                None => {
                    tracing::warn!(
                        message_id = %message.id,
                        "Tool message without toolCallId, skipping"
                    );
                    continue;
                }
            };
            let response = serde_json::from_str(&message.content).unwrap_or_else(|e| {
                tracing::warn!(
                    tool_call_id = %tool_call_id,
                    error = %e,
                    "Unparsable tool result payload, degrading to error result"
                );
                serde_json::json!({
                    "error": format!("unparsable tool result: {}", e),
                    "raw": message.content,
                })
            });
            parts.push(Part::FunctionResponse {
                id: tool_call_id.clone(),
                name: message.name.clone().unwrap_or_default(),
                response,
            });
            resolved_ids.push(tool_call_id);
        }

        if parts.is_empty() {
            return Err(BridgeError::NoToolResults);
        }
        Ok(ResolvedInput::ToolResults {
            message: NewMessage::tool_results(parts),
            resolved_ids,
        })
    }

    /// Persist IDs still outstanding at stream end; returns whether any were
    async fn reconcile(
        sessions: &SessionToolCallManager,
        identity: &SessionIdentity,
        outstanding: &[String],
    ) -> bool {
        if outstanding.is_empty() {
            return false;
        }
        if let Err(e) = sessions
            .add_pending_tool_calls(identity, outstanding)
            .await
        {
            tracing::error!(
                session = %identity,
                error = %e,
                "Failed to persist pending tool calls"
            );
        }
        true
    }

    fn terminal_error(err: &BridgeError) -> AgUiEvent {
        AgUiEvent::run_error(
            err.to_string(),
            Some(err.error_code().to_string()),
            err.to_error_details(),
        )
    }

    fn rejection_stream(err: BridgeError) -> Pin<Box<dyn Stream<Item = AgUiEvent> + Send>> {
        Box::pin(futures::stream::once(async move {
            Self::terminal_error(&err)
        }))
    }
}

impl Clone for BridgeHandler {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            sessions: self.sessions.clone(),
            locks: self.locks.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            encoder: self.encoder.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn input_with(messages: Vec<Message>) -> RunAgentInput {
        let mut input = RunAgentInput::new("conv-1");
        input.messages = messages;
        input
    }

    #[test]
    fn test_resolve_fresh_user_message() {
        let input = input_with(vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ]);
        match BridgeHandler::resolve_input(&input).unwrap() {
            ResolvedInput::Fresh(message) => {
                assert_eq!(message.role, Role::User);
                assert_eq!(
                    message.parts,
                    vec![Part::Text {
                        text: "second".to_string()
                    }]
                );
            }
            _ => panic!("Expected fresh input"),
        }
    }

    #[test]
    fn test_resolve_empty_messages_rejected() {
        let err = BridgeHandler::resolve_input(&input_with(vec![])).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_resolve_no_user_message_rejected() {
        let input = input_with(vec![Message::assistant("only assistant")]);
        let err = BridgeHandler::resolve_input(&input).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_resolve_trailing_tool_messages() {
        let input = input_with(vec![
            Message::user("do it"),
            Message::tool("call-1", r#"{"approved": true}"#),
            Message::tool("call-2", r#"{"approved": false}"#),
        ]);
        match BridgeHandler::resolve_input(&input).unwrap() {
            ResolvedInput::ToolResults {
                message,
                resolved_ids,
            } => {
                assert_eq!(message.role, Role::Tool);
                assert_eq!(resolved_ids, vec!["call-1", "call-2"]);
                assert_eq!(message.parts.len(), 2);
            }
            _ => panic!("Expected tool results"),
        }
    }

    #[test]
    fn test_resolve_unparsable_result_degrades() {
        let input = input_with(vec![
            Message::user("do it"),
            Message::tool("call-1", "not json at all"),
        ]);
        match BridgeHandler::resolve_input(&input).unwrap() {
            ResolvedInput::ToolResults { message, .. } => match &message.parts[0] {
                Part::FunctionResponse { response, .. } => {
                    assert!(response["error"]
                        .as_str()
                        .unwrap()
                        .contains("unparsable tool result"));
                    assert_eq!(response["raw"], "not json at all");
                }
                _ => panic!("Expected function response"),
            },
            _ => panic!("Expected tool results"),
        }
    }

    #[test]
    fn test_resolve_tool_messages_without_ids_rejected() {
        let mut message = Message::tool("call-1", r#"{"ok": true}"#);
        message.tool_call_id = None;
        let input = input_with(vec![Message::user("do it"), message]);

        let err = BridgeHandler::resolve_input(&input).unwrap_err();
        assert_eq!(err.error_code(), "NO_TOOL_RESULTS");
    }
}
