//! Subscribers: ordered observers that may mutate or halt a run's state.
//!
//! Every hook receives a [`SubscriberParams`] holding its own copy of the
//! current transcript and state plus a read-only [`AgentInfo`] snapshot.
//! Mutating hooks return `Ok(None)` for "no change" or a sparse
//! [`StateMutation`]; the [`chain`] runner folds those into the running view
//! in registration order.

pub mod chain;
pub mod logging;

pub use chain::{notify_subscribers, run_subscribers_with_mutation, Notification};
pub use logging::LoggingSubscriber;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::apply::EventDetail;
use crate::error::AgentError;
use crate::events::{
    CustomEvent, Event, EventType, MessagesSnapshotEvent, RawEvent, RunErrorEvent,
    RunFinishedEvent, RunStartedEvent, StateDeltaEvent, StateSnapshotEvent, StepFinishedEvent,
    StepStartedEvent, TextMessageContentEvent, TextMessageEndEvent, TextMessageStartEvent,
    ToolCallArgsEvent, ToolCallEndEvent, ToolCallResultEvent, ToolCallStartEvent,
};
use crate::types::{Message, RunAgentInput, State, ToolCall};

/// Sparse proposed change to the transcript and/or state.
///
/// A present field replaces the running value wholesale; an absent field
/// leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMutation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    /// Skip the remaining subscribers for the current hook.
    #[serde(default)]
    pub stop_propagation: bool,
}

impl StateMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    /// Halt propagation to later subscribers.
    pub fn stop(mut self) -> Self {
        self.stop_propagation = true;
        self
    }

    /// No field changes and no stop request.
    pub fn is_empty(&self) -> bool {
        self.messages.is_none() && self.state.is_none() && !self.stop_propagation
    }
}

/// Read-only identity of the agent that owns a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub agent_id: String,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Arguments common to every hook.
#[derive(Debug, Clone)]
pub struct SubscriberParams {
    /// Transcript as seen by this subscriber, including earlier subscribers' changes.
    pub messages: Vec<Message>,
    pub state: State,
    pub agent: AgentInfo,
    pub input: Arc<RunAgentInput>,
}

/// Per-run context shared by every hook invocation.
#[derive(Debug, Clone)]
pub struct RunScope {
    pub agent: AgentInfo,
    pub input: Arc<RunAgentInput>,
}

impl RunScope {
    pub fn new(agent: AgentInfo, input: Arc<RunAgentInput>) -> Self {
        Self { agent, input }
    }

    pub(crate) fn params(&self, messages: Vec<Message>, state: State) -> SubscriberParams {
        SubscriberParams {
            messages,
            state,
            agent: self.agent.clone(),
            input: Arc::clone(&self.input),
        }
    }
}

/// Convenience alias for mutating hook results.
pub type HookResult = Result<Option<StateMutation>, AgentError>;

/// Observer of a run. Every hook is optional.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use cadence::subscriber::{AgentSubscriber, HookResult, StateMutation, SubscriberParams};
/// use cadence::events::StateSnapshotEvent;
///
/// struct FreezeState;
///
/// #[async_trait]
/// impl AgentSubscriber for FreezeState {
///     async fn on_state_snapshot_event(
///         &self,
///         _event: &StateSnapshotEvent,
///         params: SubscriberParams,
///     ) -> HookResult {
///         Ok(Some(StateMutation::new().with_state(params.input.state.clone()).stop()))
///     }
/// }
/// ```
#[async_trait]
pub trait AgentSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    // Lifecycle

    async fn on_run_initialized(&self, _params: SubscriberParams) -> HookResult {
        Ok(None)
    }

    async fn on_run_failed(&self, _error: &AgentError, _params: SubscriberParams) -> HookResult {
        Ok(None)
    }

    async fn on_run_finalized(&self, _params: SubscriberParams) -> HookResult {
        Ok(None)
    }

    /// Called for every event before its variant hook.
    async fn on_event(&self, _event: &Event, _params: SubscriberParams) -> HookResult {
        Ok(None)
    }

    // Variant hooks

    async fn on_run_started_event(
        &self,
        _event: &RunStartedEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_run_finished_event(
        &self,
        _event: &RunFinishedEvent,
        _result: Option<&Value>,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_run_error_event(
        &self,
        _event: &RunErrorEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_step_started_event(
        &self,
        _event: &StepStartedEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_step_finished_event(
        &self,
        _event: &StepFinishedEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_text_message_start_event(
        &self,
        _event: &TextMessageStartEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    /// `text_message_buffer` holds the message text including this delta.
    async fn on_text_message_content_event(
        &self,
        _event: &TextMessageContentEvent,
        _text_message_buffer: &str,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_text_message_end_event(
        &self,
        _event: &TextMessageEndEvent,
        _text_message_buffer: &str,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_tool_call_start_event(
        &self,
        _event: &ToolCallStartEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    /// `partial_tool_call_args` is a best-effort parse of the truncated buffer.
    async fn on_tool_call_args_event(
        &self,
        _event: &ToolCallArgsEvent,
        _tool_call_name: &str,
        _tool_call_buffer: &str,
        _partial_tool_call_args: Option<&Value>,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_tool_call_end_event(
        &self,
        _event: &ToolCallEndEvent,
        _tool_call_name: &str,
        _tool_call_args: &Value,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_tool_call_result_event(
        &self,
        _event: &ToolCallResultEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_state_snapshot_event(
        &self,
        _event: &StateSnapshotEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_state_delta_event(
        &self,
        _event: &StateDeltaEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_messages_snapshot_event(
        &self,
        _event: &MessagesSnapshotEvent,
        _params: SubscriberParams,
    ) -> HookResult {
        Ok(None)
    }

    async fn on_raw_event(&self, _event: &RawEvent, _params: SubscriberParams) -> HookResult {
        Ok(None)
    }

    async fn on_custom_event(&self, _event: &CustomEvent, _params: SubscriberParams) -> HookResult {
        Ok(None)
    }

    // Notifications, fired after a commit.

    async fn on_messages_changed(&self, _params: SubscriberParams) {}

    async fn on_state_changed(&self, _params: SubscriberParams) {}

    async fn on_new_message(&self, _message: &Message, _params: SubscriberParams) {}

    async fn on_new_tool_call(&self, _tool_call: &ToolCall, _params: SubscriberParams) {}
}

/// A mutating hook point, mapped onto the matching [`AgentSubscriber`] method.
#[derive(Debug, Clone, Copy)]
pub enum Hook<'a> {
    RunInitialized,
    RunFailed(&'a AgentError),
    RunFinalized,
    /// The general per-event hook ([`AgentSubscriber::on_event`]).
    Event {
        event: &'a Event,
        detail: &'a EventDetail,
    },
    /// The hook specific to the event's variant.
    EventVariant {
        event: &'a Event,
        detail: &'a EventDetail,
    },
}

impl Hook<'_> {
    /// Method name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunInitialized => "on_run_initialized",
            Self::RunFailed(_) => "on_run_failed",
            Self::RunFinalized => "on_run_finalized",
            Self::Event { .. } => "on_event",
            Self::EventVariant { event, .. } => variant_hook_name(event.event_type()),
        }
    }

    /// Invoke this hook on `subscriber`.
    pub async fn invoke(&self, subscriber: &dyn AgentSubscriber, params: SubscriberParams) -> HookResult {
        match *self {
            Self::RunInitialized => subscriber.on_run_initialized(params).await,
            Self::RunFailed(error) => subscriber.on_run_failed(error, params).await,
            Self::RunFinalized => subscriber.on_run_finalized(params).await,
            Self::Event { event, .. } => subscriber.on_event(event, params).await,
            Self::EventVariant { event, detail } => {
                invoke_variant(subscriber, event, detail, params).await
            }
        }
    }
}

async fn invoke_variant(
    subscriber: &dyn AgentSubscriber,
    event: &Event,
    detail: &EventDetail,
    params: SubscriberParams,
) -> HookResult {
    match event {
        Event::RunStarted(e) => subscriber.on_run_started_event(e, params).await,
        Event::RunFinished(e) => {
            let result = detail.result.as_ref().or(e.result.as_ref());
            subscriber.on_run_finished_event(e, result, params).await
        }
        Event::RunError(e) => subscriber.on_run_error_event(e, params).await,
        Event::StepStarted(e) => subscriber.on_step_started_event(e, params).await,
        Event::StepFinished(e) => subscriber.on_step_finished_event(e, params).await,
        Event::TextMessageStart(e) => subscriber.on_text_message_start_event(e, params).await,
        Event::TextMessageContent(e) => {
            let buffer = detail.text_message_buffer.as_deref().unwrap_or_default();
            subscriber
                .on_text_message_content_event(e, buffer, params)
                .await
        }
        Event::TextMessageEnd(e) => {
            let buffer = detail.text_message_buffer.as_deref().unwrap_or_default();
            subscriber.on_text_message_end_event(e, buffer, params).await
        }
        Event::ToolCallStart(e) => subscriber.on_tool_call_start_event(e, params).await,
        Event::ToolCallArgs(e) => {
            subscriber
                .on_tool_call_args_event(
                    e,
                    detail.tool_call_name.as_deref().unwrap_or_default(),
                    detail.tool_call_buffer.as_deref().unwrap_or_default(),
                    detail.tool_call_args.as_ref(),
                    params,
                )
                .await
        }
        Event::ToolCallEnd(e) => {
            let empty = Value::Object(Map::new());
            let args = detail.tool_call_args.as_ref().unwrap_or(&empty);
            let name = detail.tool_call_name.as_deref().unwrap_or_default();
            subscriber.on_tool_call_end_event(e, name, args, params).await
        }
        Event::ToolCallResult(e) => subscriber.on_tool_call_result_event(e, params).await,
        Event::StateSnapshot(e) => subscriber.on_state_snapshot_event(e, params).await,
        Event::StateDelta(e) => subscriber.on_state_delta_event(e, params).await,
        Event::MessagesSnapshot(e) => subscriber.on_messages_snapshot_event(e, params).await,
        Event::Raw(e) => subscriber.on_raw_event(e, params).await,
        Event::Custom(e) => subscriber.on_custom_event(e, params).await,
        // Chunks are expanded before they reach subscribers.
        Event::TextMessageChunk(_) | Event::ToolCallChunk(_) => Ok(None),
    }
}

fn variant_hook_name(event_type: EventType) -> &'static str {
    match event_type {
        EventType::RunStarted => "on_run_started_event",
        EventType::RunFinished => "on_run_finished_event",
        EventType::RunError => "on_run_error_event",
        EventType::StepStarted => "on_step_started_event",
        EventType::StepFinished => "on_step_finished_event",
        EventType::TextMessageStart => "on_text_message_start_event",
        EventType::TextMessageContent => "on_text_message_content_event",
        EventType::TextMessageEnd => "on_text_message_end_event",
        EventType::TextMessageChunk => "on_text_message_chunk_event",
        EventType::ToolCallStart => "on_tool_call_start_event",
        EventType::ToolCallArgs => "on_tool_call_args_event",
        EventType::ToolCallEnd => "on_tool_call_end_event",
        EventType::ToolCallChunk => "on_tool_call_chunk_event",
        EventType::ToolCallResult => "on_tool_call_result_event",
        EventType::StateSnapshot => "on_state_snapshot_event",
        EventType::StateDelta => "on_state_delta_event",
        EventType::MessagesSnapshot => "on_messages_snapshot_event",
        EventType::Raw => "on_raw_event",
        EventType::Custom => "on_custom_event",
    }
}
