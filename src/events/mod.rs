//! Run event model.
//!
//! The closed set of events a producer may emit during one run. Events are
//! serialized with a `"type"` tag carrying the wire name (`RUN_STARTED`,
//! `TEXT_MESSAGE_CONTENT`, ...) and camelCase payload fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::types::{Message, Role, State};

/// Fields shared by every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Original payload from an external system, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_event: Option<Value>,
}

/// Event discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RunStarted,
    RunFinished,
    RunError,
    StepStarted,
    StepFinished,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    TextMessageChunk,
    ToolCallStart,
    ToolCallArgs,
    ToolCallEnd,
    ToolCallChunk,
    ToolCallResult,
    StateSnapshot,
    StateDelta,
    MessagesSnapshot,
    Raw,
    Custom,
}

/// One unit of a producer's output stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    RunStarted(RunStartedEvent),
    RunFinished(RunFinishedEvent),
    RunError(RunErrorEvent),
    StepStarted(StepStartedEvent),
    StepFinished(StepFinishedEvent),
    TextMessageStart(TextMessageStartEvent),
    TextMessageContent(TextMessageContentEvent),
    TextMessageEnd(TextMessageEndEvent),
    TextMessageChunk(TextMessageChunkEvent),
    ToolCallStart(ToolCallStartEvent),
    ToolCallArgs(ToolCallArgsEvent),
    ToolCallEnd(ToolCallEndEvent),
    ToolCallChunk(ToolCallChunkEvent),
    ToolCallResult(ToolCallResultEvent),
    StateSnapshot(StateSnapshotEvent),
    StateDelta(StateDeltaEvent),
    MessagesSnapshot(MessagesSnapshotEvent),
    Raw(RawEvent),
    Custom(CustomEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunStartedEvent {
    pub thread_id: String,
    pub run_id: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunFinishedEvent {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunErrorEvent {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepStartedEvent {
    pub step_name: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepFinishedEvent {
    pub step_name: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageStartEvent {
    pub message_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageContentEvent {
    pub message_id: String,
    pub delta: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageEndEvent {
    pub message_id: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

/// Partial text fragment; expanded into start/content/end before reduction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageChunkEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallStartEvent {
    pub tool_call_id: String,
    pub tool_call_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallArgsEvent {
    pub tool_call_id: String,
    pub delta: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallEndEvent {
    pub tool_call_id: String,
    #[serde(flatten)]
    pub base: BaseEvent,
}

/// Partial tool-call fragment; expanded into start/args/end before reduction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallChunkEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResultEvent {
    pub message_id: String,
    pub tool_call_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshotEvent {
    pub snapshot: State,
    #[serde(flatten)]
    pub base: BaseEvent,
}

/// Ordered patch operations applied to the previous state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateDeltaEvent {
    pub delta: Vec<Value>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagesSnapshotEvent {
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub event: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub name: String,
    pub value: Value,
    #[serde(flatten)]
    pub base: BaseEvent,
}

impl Event {
    pub fn run_started(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::RunStarted(RunStartedEvent {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            base: BaseEvent::default(),
        })
    }

    pub fn run_finished(
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
        result: Option<Value>,
    ) -> Self {
        Self::RunFinished(RunFinishedEvent {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            result,
            base: BaseEvent::default(),
        })
    }

    pub fn run_error(message: impl Into<String>, code: Option<String>) -> Self {
        Self::RunError(RunErrorEvent {
            message: message.into(),
            code,
            base: BaseEvent::default(),
        })
    }

    pub fn step_started(step_name: impl Into<String>) -> Self {
        Self::StepStarted(StepStartedEvent {
            step_name: step_name.into(),
            base: BaseEvent::default(),
        })
    }

    pub fn step_finished(step_name: impl Into<String>) -> Self {
        Self::StepFinished(StepFinishedEvent {
            step_name: step_name.into(),
            base: BaseEvent::default(),
        })
    }

    /// Start an assistant text message.
    pub fn text_message_start(message_id: impl Into<String>) -> Self {
        Self::TextMessageStart(TextMessageStartEvent {
            message_id: message_id.into(),
            role: Role::Assistant,
            base: BaseEvent::default(),
        })
    }

    pub fn text_message_content(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextMessageContent(TextMessageContentEvent {
            message_id: message_id.into(),
            delta: delta.into(),
            base: BaseEvent::default(),
        })
    }

    pub fn text_message_end(message_id: impl Into<String>) -> Self {
        Self::TextMessageEnd(TextMessageEndEvent {
            message_id: message_id.into(),
            base: BaseEvent::default(),
        })
    }

    pub fn text_message_chunk(
        message_id: Option<String>,
        role: Option<Role>,
        delta: Option<String>,
    ) -> Self {
        Self::TextMessageChunk(TextMessageChunkEvent {
            message_id,
            role,
            delta,
            base: BaseEvent::default(),
        })
    }

    pub fn tool_call_start(
        tool_call_id: impl Into<String>,
        tool_call_name: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Self {
        Self::ToolCallStart(ToolCallStartEvent {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id,
            base: BaseEvent::default(),
        })
    }

    pub fn tool_call_args(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ToolCallArgs(ToolCallArgsEvent {
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
            base: BaseEvent::default(),
        })
    }

    pub fn tool_call_end(tool_call_id: impl Into<String>) -> Self {
        Self::ToolCallEnd(ToolCallEndEvent {
            tool_call_id: tool_call_id.into(),
            base: BaseEvent::default(),
        })
    }

    pub fn tool_call_chunk(
        tool_call_id: Option<String>,
        tool_call_name: Option<String>,
        parent_message_id: Option<String>,
        delta: Option<String>,
    ) -> Self {
        Self::ToolCallChunk(ToolCallChunkEvent {
            tool_call_id,
            tool_call_name,
            parent_message_id,
            delta,
            base: BaseEvent::default(),
        })
    }

    pub fn tool_call_result(
        message_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolCallResult(ToolCallResultEvent {
            message_id: message_id.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            role: Some(Role::Tool),
            base: BaseEvent::default(),
        })
    }

    pub fn state_snapshot(snapshot: State) -> Self {
        Self::StateSnapshot(StateSnapshotEvent {
            snapshot,
            base: BaseEvent::default(),
        })
    }

    pub fn state_delta(delta: Vec<Value>) -> Self {
        Self::StateDelta(StateDeltaEvent {
            delta,
            base: BaseEvent::default(),
        })
    }

    pub fn messages_snapshot(messages: Vec<Message>) -> Self {
        Self::MessagesSnapshot(MessagesSnapshotEvent {
            messages,
            base: BaseEvent::default(),
        })
    }

    pub fn raw(event: Value, source: Option<String>) -> Self {
        Self::Raw(RawEvent {
            event,
            source,
            base: BaseEvent::default(),
        })
    }

    pub fn custom(name: impl Into<String>, value: Value) -> Self {
        Self::Custom(CustomEvent {
            name: name.into(),
            value,
            base: BaseEvent::default(),
        })
    }

    /// Discriminant of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RunStarted(_) => EventType::RunStarted,
            Self::RunFinished(_) => EventType::RunFinished,
            Self::RunError(_) => EventType::RunError,
            Self::StepStarted(_) => EventType::StepStarted,
            Self::StepFinished(_) => EventType::StepFinished,
            Self::TextMessageStart(_) => EventType::TextMessageStart,
            Self::TextMessageContent(_) => EventType::TextMessageContent,
            Self::TextMessageEnd(_) => EventType::TextMessageEnd,
            Self::TextMessageChunk(_) => EventType::TextMessageChunk,
            Self::ToolCallStart(_) => EventType::ToolCallStart,
            Self::ToolCallArgs(_) => EventType::ToolCallArgs,
            Self::ToolCallEnd(_) => EventType::ToolCallEnd,
            Self::ToolCallChunk(_) => EventType::ToolCallChunk,
            Self::ToolCallResult(_) => EventType::ToolCallResult,
            Self::StateSnapshot(_) => EventType::StateSnapshot,
            Self::StateDelta(_) => EventType::StateDelta,
            Self::MessagesSnapshot(_) => EventType::MessagesSnapshot,
            Self::Raw(_) => EventType::Raw,
            Self::Custom(_) => EventType::Custom,
        }
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished(_) | Self::RunError(_))
    }

    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::RunStarted(e) => &e.base,
            Self::RunFinished(e) => &e.base,
            Self::RunError(e) => &e.base,
            Self::StepStarted(e) => &e.base,
            Self::StepFinished(e) => &e.base,
            Self::TextMessageStart(e) => &e.base,
            Self::TextMessageContent(e) => &e.base,
            Self::TextMessageEnd(e) => &e.base,
            Self::TextMessageChunk(e) => &e.base,
            Self::ToolCallStart(e) => &e.base,
            Self::ToolCallArgs(e) => &e.base,
            Self::ToolCallEnd(e) => &e.base,
            Self::ToolCallChunk(e) => &e.base,
            Self::ToolCallResult(e) => &e.base,
            Self::StateSnapshot(e) => &e.base,
            Self::StateDelta(e) => &e.base,
            Self::MessagesSnapshot(e) => &e.base,
            Self::Raw(e) => &e.base,
            Self::Custom(e) => &e.base,
        }
    }

    fn base_mut(&mut self) -> &mut BaseEvent {
        match self {
            Self::RunStarted(e) => &mut e.base,
            Self::RunFinished(e) => &mut e.base,
            Self::RunError(e) => &mut e.base,
            Self::StepStarted(e) => &mut e.base,
            Self::StepFinished(e) => &mut e.base,
            Self::TextMessageStart(e) => &mut e.base,
            Self::TextMessageContent(e) => &mut e.base,
            Self::TextMessageEnd(e) => &mut e.base,
            Self::TextMessageChunk(e) => &mut e.base,
            Self::ToolCallStart(e) => &mut e.base,
            Self::ToolCallArgs(e) => &mut e.base,
            Self::ToolCallEnd(e) => &mut e.base,
            Self::ToolCallChunk(e) => &mut e.base,
            Self::ToolCallResult(e) => &mut e.base,
            Self::StateSnapshot(e) => &mut e.base,
            Self::StateDelta(e) => &mut e.base,
            Self::MessagesSnapshot(e) => &mut e.base,
            Self::Raw(e) => &mut e.base,
            Self::Custom(e) => &mut e.base,
        }
    }

    /// Set the timestamp on the event.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.base_mut().timestamp = Some(timestamp);
        self
    }

    /// Stamp the event with the current wall-clock time.
    pub fn stamped(self) -> Self {
        self.with_timestamp(chrono::Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_wire_tags_and_camel_case_fields() {
        let event = Event::tool_call_start("call-1", "search", Some("msg-1".into()));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "TOOL_CALL_START",
                "toolCallId": "call-1",
                "toolCallName": "search",
                "parentMessageId": "msg-1"
            })
        );
    }

    #[test]
    fn deserializes_base_fields_alongside_payload() {
        let event: Event = serde_json::from_value(json!({
            "type": "TEXT_MESSAGE_CONTENT",
            "messageId": "m1",
            "delta": "Hi",
            "timestamp": 1700000000000i64
        }))
        .unwrap();
        assert_eq!(event.event_type(), EventType::TextMessageContent);
        assert_eq!(event.base().timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn event_type_displays_wire_name() {
        assert_eq!(EventType::StateDelta.to_string(), "STATE_DELTA");
        assert_eq!("RUN_FINISHED".parse::<EventType>().unwrap(), EventType::RunFinished);
    }

    #[test]
    fn terminal_events() {
        assert!(Event::run_finished("t", "r", None).is_terminal());
        assert!(Event::run_error("boom", None).is_terminal());
        assert!(!Event::step_started("plan").is_terminal());
    }

    #[test]
    fn stamped_events_carry_current_time() {
        let before = chrono::Utc::now().timestamp_millis();
        let event = Event::text_message_start("m1").stamped();
        let stamped = event.base().timestamp.unwrap();
        assert!(stamped >= before);
        assert_eq!(event.event_type(), EventType::TextMessageStart);
    }
}
