//! Mutation reduction: turning verified events into message/state changes.
//!
//! A [`Reducer`] is asked once per event for the mutation it implies against
//! the current transcript and state. Reducers may keep buffers for entities
//! that span several events (open text messages, tool calls), but a fresh
//! reducer is built for every run so replaying the same events against the
//! same snapshot always commits the same result.

pub mod default;
pub mod patch;

pub use default::DefaultReducer;
pub use patch::apply_state_delta;

use serde_json::Value;

use crate::error::AgentError;
use crate::events::Event;
use crate::subscriber::StateMutation;
use crate::types::{Message, State, ToolCall};

/// Strategy that maps one event onto a candidate mutation.
pub trait Reducer: Send {
    /// Reduce `event` against the current transcript and state.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Protocol`] when the event cannot be interpreted
    /// (content for an unknown message, tool arguments that never form a
    /// JSON object).
    fn reduce(
        &mut self,
        messages: &[Message],
        state: &State,
        event: &Event,
    ) -> Result<Reduction, AgentError>;
}

/// Output of one reduction step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reduction {
    /// Candidate change; `None` means the event leaves messages and state alone.
    pub mutation: Option<StateMutation>,
    /// Side data handed to the event's subscriber hooks.
    pub detail: EventDetail,
}

impl Reduction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_mutation(mut self, mutation: StateMutation) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }
}

/// Per-event context exposed to variant hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDetail {
    /// Text accumulated so far for the open message.
    pub text_message_buffer: Option<String>,
    pub tool_call_name: Option<String>,
    /// Raw argument text accumulated so far for the open tool call.
    pub tool_call_buffer: Option<String>,
    /// Partial arguments on `TOOL_CALL_ARGS`, final arguments on `TOOL_CALL_END`.
    pub tool_call_args: Option<Value>,
    /// Message completed by this event.
    pub new_message: Option<Message>,
    /// Tool call completed by this event.
    pub new_tool_call: Option<ToolCall>,
    /// Result carried by `RUN_FINISHED`.
    pub result: Option<Value>,
}
