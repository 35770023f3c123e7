//! Previous-generation runtime protocol, kept for older consumers.
//!
//! Modern events are translated one-to-one (or dropped) into the action
//! execution and agent-state message shapes the old runtime understood.

pub mod convert;

pub use convert::convert_to_legacy_events;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;
use crate::types::State;

/// Stream of translated events.
pub type LegacyEventStream = BoxStream<'static, Result<LegacyRuntimeEvent, AgentError>>;

/// A legacy event tagged with the identifiers of the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRuntimeEvent {
    pub thread_id: String,
    pub run_id: String,
    pub agent_name: String,
    #[serde(flatten)]
    pub event: LegacyEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum LegacyEvent {
    TextMessageStart {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    TextMessageContent {
        message_id: String,
        content: String,
    },
    TextMessageEnd {
        message_id: String,
    },
    ActionExecutionStart {
        action_execution_id: String,
        action_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    ActionExecutionArgs {
        action_execution_id: String,
        args: String,
    },
    ActionExecutionEnd {
        action_execution_id: String,
    },
    ActionExecutionResult {
        action_execution_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_name: Option<String>,
        result: String,
    },
    AgentStateMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_name: Option<String>,
        active: bool,
        running: bool,
        role: String,
        state: State,
    },
    MetaEvent {
        name: String,
        value: Value,
    },
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl LegacyEvent {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextMessageStart { .. } => "TextMessageStart",
            Self::TextMessageContent { .. } => "TextMessageContent",
            Self::TextMessageEnd { .. } => "TextMessageEnd",
            Self::ActionExecutionStart { .. } => "ActionExecutionStart",
            Self::ActionExecutionArgs { .. } => "ActionExecutionArgs",
            Self::ActionExecutionEnd { .. } => "ActionExecutionEnd",
            Self::ActionExecutionResult { .. } => "ActionExecutionResult",
            Self::AgentStateMessage { .. } => "AgentStateMessage",
            Self::MetaEvent { .. } => "MetaEvent",
            Self::RunError { .. } => "RunError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn runtime_event_flattens_payload() {
        let event = LegacyRuntimeEvent {
            thread_id: "t".into(),
            run_id: "r".into(),
            agent_name: "a".into(),
            event: LegacyEvent::ActionExecutionArgs {
                action_execution_id: "c1".into(),
                args: "{\"q\":".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "threadId": "t",
                "runId": "r",
                "agentName": "a",
                "type": "ActionExecutionArgs",
                "actionExecutionId": "c1",
                "args": "{\"q\":"
            })
        );
    }
}
