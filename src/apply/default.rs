//! Reducer for the standard event model.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::AgentError;
use crate::events::{
    Event, TextMessageContentEvent, TextMessageEndEvent, TextMessageStartEvent, ToolCallArgsEvent,
    ToolCallEndEvent, ToolCallResultEvent, ToolCallStartEvent,
};
use crate::subscriber::StateMutation;
use crate::types::{Message, Role, State, ToolCall};
use crate::util::partial_json::parse_partial;

use super::{apply_state_delta, EventDetail, Reducer, Reduction};

#[derive(Debug)]
struct TextBuffer {
    role: Role,
    content: String,
}

#[derive(Debug)]
struct ToolCallBuffer {
    name: String,
    parent_message_id: Option<String>,
    arguments: String,
}

/// Buffers text messages and tool calls until their end events, then
/// appends them to the transcript.
#[derive(Debug, Default)]
pub struct DefaultReducer {
    text: HashMap<String, TextBuffer>,
    tool_calls: HashMap<String, ToolCallBuffer>,
}

impl DefaultReducer {
    pub fn new() -> Self {
        Self::default()
    }

    fn text_message_start(&mut self, e: &TextMessageStartEvent) -> Reduction {
        self.text.insert(
            e.message_id.clone(),
            TextBuffer {
                role: e.role,
                content: String::new(),
            },
        );
        Reduction::none().with_detail(EventDetail {
            text_message_buffer: Some(String::new()),
            ..Default::default()
        })
    }

    fn text_message_content(&mut self, e: &TextMessageContentEvent) -> Result<Reduction, AgentError> {
        let buffer = self.text.get_mut(&e.message_id).ok_or_else(|| {
            AgentError::protocol(format!(
                "TEXT_MESSAGE_CONTENT for unknown message '{}'",
                e.message_id
            ))
        })?;
        buffer.content.push_str(&e.delta);
        Ok(Reduction::none().with_detail(EventDetail {
            text_message_buffer: Some(buffer.content.clone()),
            ..Default::default()
        }))
    }

    fn text_message_end(
        &mut self,
        messages: &[Message],
        e: &TextMessageEndEvent,
    ) -> Result<Reduction, AgentError> {
        let buffer = self.text.remove(&e.message_id).ok_or_else(|| {
            AgentError::protocol(format!(
                "TEXT_MESSAGE_END for unknown message '{}'",
                e.message_id
            ))
        })?;

        let mut next = messages.to_vec();
        let completed = match next.iter_mut().find(|m| m.id == e.message_id) {
            Some(existing) => {
                existing.content = Some(buffer.content.clone());
                existing.clone()
            }
            None => {
                let message = Message::new(
                    e.message_id.clone(),
                    buffer.role,
                    Some(buffer.content.clone()),
                );
                next.push(message.clone());
                message
            }
        };

        Ok(Reduction::none()
            .with_mutation(StateMutation::new().with_messages(next))
            .with_detail(EventDetail {
                text_message_buffer: Some(buffer.content),
                new_message: Some(completed),
                ..Default::default()
            }))
    }

    fn tool_call_start(&mut self, e: &ToolCallStartEvent) -> Reduction {
        self.tool_calls.insert(
            e.tool_call_id.clone(),
            ToolCallBuffer {
                name: e.tool_call_name.clone(),
                parent_message_id: e.parent_message_id.clone(),
                arguments: String::new(),
            },
        );
        Reduction::none().with_detail(EventDetail {
            tool_call_name: Some(e.tool_call_name.clone()),
            tool_call_buffer: Some(String::new()),
            ..Default::default()
        })
    }

    fn tool_call_args(&mut self, e: &ToolCallArgsEvent) -> Result<Reduction, AgentError> {
        let buffer = self.tool_calls.get_mut(&e.tool_call_id).ok_or_else(|| {
            AgentError::protocol(format!(
                "TOOL_CALL_ARGS for unknown tool call '{}'",
                e.tool_call_id
            ))
        })?;
        buffer.arguments.push_str(&e.delta);
        Ok(Reduction::none().with_detail(EventDetail {
            tool_call_name: Some(buffer.name.clone()),
            tool_call_buffer: Some(buffer.arguments.clone()),
            tool_call_args: parse_partial(&buffer.arguments),
            ..Default::default()
        }))
    }

    fn tool_call_end(
        &mut self,
        messages: &[Message],
        e: &ToolCallEndEvent,
    ) -> Result<Reduction, AgentError> {
        let buffer = self.tool_calls.remove(&e.tool_call_id).ok_or_else(|| {
            AgentError::protocol(format!(
                "TOOL_CALL_END for unknown tool call '{}'",
                e.tool_call_id
            ))
        })?;
        let arguments = parse_tool_arguments(&e.tool_call_id, &buffer.arguments)?;
        let call = ToolCall::new(e.tool_call_id.clone(), buffer.name.clone(), arguments.clone());

        let mut next = messages.to_vec();
        let parent = buffer
            .parent_message_id
            .clone()
            .unwrap_or_else(|| e.tool_call_id.clone());
        match next.iter_mut().find(|m| m.id == parent) {
            Some(existing) => existing.tool_calls.push(call.clone()),
            None => next.push(Message::new(parent, Role::Assistant, None).with_tool_call(call.clone())),
        }

        Ok(Reduction::none()
            .with_mutation(StateMutation::new().with_messages(next))
            .with_detail(EventDetail {
                tool_call_name: Some(buffer.name),
                tool_call_buffer: Some(buffer.arguments),
                tool_call_args: Some(arguments),
                new_tool_call: Some(call),
                ..Default::default()
            }))
    }

    fn tool_call_result(&self, messages: &[Message], e: &ToolCallResultEvent) -> Reduction {
        let message = Message {
            tool_call_id: Some(e.tool_call_id.clone()),
            ..Message::new(
                e.message_id.clone(),
                e.role.unwrap_or(Role::Tool),
                Some(e.content.clone()),
            )
        };
        let mut next = messages.to_vec();
        next.push(message.clone());
        Reduction::none()
            .with_mutation(StateMutation::new().with_messages(next))
            .with_detail(EventDetail {
                new_message: Some(message),
                ..Default::default()
            })
    }
}

impl Reducer for DefaultReducer {
    fn reduce(
        &mut self,
        messages: &[Message],
        state: &State,
        event: &Event,
    ) -> Result<Reduction, AgentError> {
        match event {
            Event::TextMessageStart(e) => Ok(self.text_message_start(e)),
            Event::TextMessageContent(e) => self.text_message_content(e),
            Event::TextMessageEnd(e) => self.text_message_end(messages, e),
            Event::ToolCallStart(e) => Ok(self.tool_call_start(e)),
            Event::ToolCallArgs(e) => self.tool_call_args(e),
            Event::ToolCallEnd(e) => self.tool_call_end(messages, e),
            Event::ToolCallResult(e) => Ok(self.tool_call_result(messages, e)),
            Event::StateSnapshot(e) => {
                Ok(Reduction::none().with_mutation(StateMutation::new().with_state(e.snapshot.clone())))
            }
            Event::StateDelta(e) => match apply_state_delta(state, &e.delta) {
                Ok(next) => Ok(Reduction::none().with_mutation(StateMutation::new().with_state(next))),
                Err(err) => {
                    tracing::warn!(error = %err, ops = e.delta.len(), "failed to apply state delta");
                    Ok(Reduction::none())
                }
            },
            Event::MessagesSnapshot(e) => Ok(Reduction::none()
                .with_mutation(StateMutation::new().with_messages(e.messages.clone()))),
            Event::RunFinished(e) => Ok(Reduction::none().with_detail(EventDetail {
                result: e.result.clone(),
                ..Default::default()
            })),
            Event::TextMessageChunk(_) | Event::ToolCallChunk(_) => Err(AgentError::protocol(format!(
                "{} must be expanded before reduction",
                event.event_type()
            ))),
            Event::RunStarted(_)
            | Event::RunError(_)
            | Event::StepStarted(_)
            | Event::StepFinished(_)
            | Event::Raw(_)
            | Event::Custom(_) => Ok(Reduction::none()),
        }
    }
}

/// Parse the complete argument text of a tool call into a JSON object.
fn parse_tool_arguments(tool_call_id: &str, text: &str) -> Result<Value, AgentError> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(AgentError::protocol(format!(
            "arguments of tool call '{tool_call_id}' are not a JSON object: {other}"
        ))),
        Err(e) => Err(AgentError::protocol(format!(
            "arguments of tool call '{tool_call_id}' are not valid JSON: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(events: &[Event]) -> Result<(Vec<Message>, State), AgentError> {
        let mut reducer = DefaultReducer::new();
        let mut messages = Vec::new();
        let mut state = json!({});
        for event in events {
            let reduction = reducer.reduce(&messages, &state, event)?;
            if let Some(mutation) = reduction.mutation {
                if let Some(m) = mutation.messages {
                    messages = m;
                }
                if let Some(s) = mutation.state {
                    state = s;
                }
            }
        }
        Ok((messages, state))
    }

    #[test]
    fn text_message_is_appended_on_end() {
        let mut reducer = DefaultReducer::new();
        let state = json!({});
        assert!(reducer
            .reduce(&[], &state, &Event::text_message_start("1"))
            .unwrap()
            .mutation
            .is_none());
        let content = reducer
            .reduce(&[], &state, &Event::text_message_content("1", "Hi"))
            .unwrap();
        assert!(content.mutation.is_none());
        assert_eq!(content.detail.text_message_buffer.as_deref(), Some("Hi"));

        let (messages, _) = run(&[
            Event::text_message_start("1"),
            Event::text_message_content("1", "Hi"),
            Event::text_message_content("1", " there"),
            Event::text_message_end("1"),
        ])
        .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "1");
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].text(), "Hi there");
    }

    #[test]
    fn content_for_unknown_message_is_a_protocol_violation() {
        let err = run(&[Event::text_message_content("nope", "x")]).unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn tool_call_attaches_to_parent_message() {
        let (messages, _) = run(&[
            Event::text_message_start("m1"),
            Event::text_message_content("m1", "Searching"),
            Event::text_message_end("m1"),
            Event::tool_call_start("c1", "search", Some("m1".into())),
            Event::tool_call_args("c1", "{\"q\":"),
            Event::tool_call_args("c1", "\"rust\"}"),
            Event::tool_call_end("c1"),
        ])
        .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tool_calls, vec![ToolCall::new("c1", "search", json!({"q": "rust"}))]);
    }

    #[test]
    fn orphan_tool_call_gets_its_own_assistant_message() {
        let (messages, _) = run(&[
            Event::tool_call_start("c1", "noop", None),
            Event::tool_call_end("c1"),
        ])
        .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "c1");
        assert_eq!(messages[0].tool_calls[0].function.arguments, json!({}));
    }

    #[test]
    fn text_end_fills_message_created_by_tool_call() {
        let (messages, _) = run(&[
            Event::text_message_start("m1"),
            Event::tool_call_start("c1", "noop", Some("m1".into())),
            Event::tool_call_end("c1"),
            Event::text_message_content("m1", "done"),
            Event::text_message_end("m1"),
        ])
        .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "done");
        assert_eq!(messages[0].tool_calls.len(), 1);
    }

    #[test]
    fn args_expose_partial_arguments() {
        let mut reducer = DefaultReducer::new();
        let state = json!({});
        reducer
            .reduce(&[], &state, &Event::tool_call_start("c1", "weather", None))
            .unwrap();
        let reduction = reducer
            .reduce(&[], &state, &Event::tool_call_args("c1", "{\"city\": \"Ber"))
            .unwrap();
        assert_eq!(reduction.detail.tool_call_name.as_deref(), Some("weather"));
        assert_eq!(reduction.detail.tool_call_args, Some(json!({"city": "Ber"})));
    }

    #[test]
    fn malformed_tool_arguments_fail_at_end() {
        let err = run(&[
            Event::tool_call_start("c1", "search", None),
            Event::tool_call_args("c1", "{\"q\": "),
            Event::tool_call_end("c1"),
        ])
        .unwrap_err();
        assert!(err.is_protocol_violation());

        let err = run(&[
            Event::tool_call_start("c2", "search", None),
            Event::tool_call_args("c2", "[1, 2]"),
            Event::tool_call_end("c2"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn tool_result_appends_tool_message() {
        let (messages, _) = run(&[Event::tool_call_result("r1", "c1", "42")]).unwrap();
        assert_eq!(messages[0].role, Role::Tool);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[0].text(), "42");
    }

    #[test]
    fn state_events_replace_or_patch_state() {
        let (_, state) = run(&[
            Event::state_snapshot(json!({"count": 0, "tag": "x"})),
            Event::state_delta(vec![
                json!({"op": "replace", "path": "/count", "value": 1}),
                json!({"op": "increment", "path": "/count"}),
            ]),
        ])
        .unwrap();
        assert_eq!(state, json!({"count": 2, "tag": "x"}));
    }

    #[test]
    fn failed_delta_produces_no_mutation() {
        let mut reducer = DefaultReducer::new();
        let reduction = reducer
            .reduce(
                &[],
                &json!({}),
                &Event::state_delta(vec![json!({"op": "remove", "path": "/missing"})]),
            )
            .unwrap();
        assert!(reduction.mutation.is_none());
    }

    #[test]
    fn run_finished_exposes_result() {
        let mut reducer = DefaultReducer::new();
        let reduction = reducer
            .reduce(&[], &json!({}), &Event::run_finished("t", "r", Some(json!({"ok": true}))))
            .unwrap();
        assert!(reduction.mutation.is_none());
        assert_eq!(reduction.detail.result, Some(json!({"ok": true})));
    }

    #[test]
    fn chunk_events_are_rejected() {
        let err = run(&[Event::text_message_chunk(Some("m".into()), None, Some("x".into()))])
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn replay_is_deterministic() {
        let events = vec![
            Event::text_message_start("1"),
            Event::text_message_content("1", "a"),
            Event::text_message_end("1"),
            Event::tool_call_start("c", "t", Some("1".into())),
            Event::tool_call_args("c", "{\"k\": 1}"),
            Event::tool_call_end("c"),
            Event::state_delta(vec![json!({"op": "add", "path": "/k", "value": 1})]),
        ];
        assert_eq!(run(&events).unwrap(), run(&events).unwrap());
    }
}
