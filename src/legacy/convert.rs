//! Modern-to-legacy event translation.

use std::collections::HashMap;

use futures::StreamExt;
use serde_json::{Map, Value};

use crate::apply::apply_state_delta;
use crate::events::Event;
use crate::stream_transform::EventStream;
use crate::types::State;

use super::{LegacyEvent, LegacyEventStream, LegacyRuntimeEvent};

/// Bookkeeping for one conversion: the legacy state messages carry the full
/// state and the current node, which modern events only convey incrementally.
#[derive(Debug)]
struct Bridge {
    state: State,
    current_step: Option<String>,
    tool_names: HashMap<String, String>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self {
            state: Value::Object(Map::new()),
            current_step: None,
            tool_names: HashMap::new(),
        }
    }
}

impl Bridge {
    fn state_message(&self, running: bool) -> LegacyEvent {
        LegacyEvent::AgentStateMessage {
            node_name: self.current_step.clone(),
            active: running,
            running,
            role: "assistant".to_string(),
            state: self.state.clone(),
        }
    }

    fn translate(&mut self, event: Event) -> Option<LegacyEvent> {
        match event {
            Event::TextMessageStart(e) => Some(LegacyEvent::TextMessageStart {
                message_id: e.message_id,
                parent_message_id: None,
            }),
            Event::TextMessageContent(e) => Some(LegacyEvent::TextMessageContent {
                message_id: e.message_id,
                content: e.delta,
            }),
            Event::TextMessageEnd(e) => Some(LegacyEvent::TextMessageEnd {
                message_id: e.message_id,
            }),
            Event::ToolCallStart(e) => {
                self.tool_names
                    .insert(e.tool_call_id.clone(), e.tool_call_name.clone());
                Some(LegacyEvent::ActionExecutionStart {
                    action_execution_id: e.tool_call_id,
                    action_name: e.tool_call_name,
                    parent_message_id: e.parent_message_id,
                })
            }
            Event::ToolCallArgs(e) => Some(LegacyEvent::ActionExecutionArgs {
                action_execution_id: e.tool_call_id,
                args: e.delta,
            }),
            Event::ToolCallEnd(e) => Some(LegacyEvent::ActionExecutionEnd {
                action_execution_id: e.tool_call_id,
            }),
            Event::ToolCallResult(e) => Some(LegacyEvent::ActionExecutionResult {
                action_name: self.tool_names.get(&e.tool_call_id).cloned(),
                action_execution_id: e.tool_call_id,
                result: e.content,
            }),
            Event::StepStarted(e) => {
                self.current_step = Some(e.step_name);
                None
            }
            Event::StepFinished(e) => {
                if self.current_step.as_deref() == Some(e.step_name.as_str()) {
                    self.current_step = None;
                }
                None
            }
            Event::StateSnapshot(e) => {
                self.state = e.snapshot;
                Some(self.state_message(true))
            }
            Event::StateDelta(e) => match apply_state_delta(&self.state, &e.delta) {
                Ok(next) => {
                    self.state = next;
                    Some(self.state_message(true))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "legacy bridge skipped state delta");
                    None
                }
            },
            Event::RunFinished(_) => Some(self.state_message(false)),
            Event::RunError(e) => Some(LegacyEvent::RunError {
                message: e.message,
                code: e.code,
            }),
            Event::Custom(e) => Some(LegacyEvent::MetaEvent {
                name: e.name,
                value: e.value,
            }),
            Event::RunStarted(_)
            | Event::MessagesSnapshot(_)
            | Event::Raw(_)
            | Event::TextMessageChunk(_)
            | Event::ToolCallChunk(_) => None,
        }
    }
}

/// Translate `events` into legacy events tagged with the run identifiers.
///
/// Order is preserved; each input event yields at most one output event.
/// Errors pass through unchanged.
pub fn convert_to_legacy_events(
    events: EventStream,
    thread_id: String,
    run_id: String,
    agent_name: String,
) -> LegacyEventStream {
    let converted = async_stream::stream! {
        let mut bridge = Bridge::default();
        let mut inner = std::pin::pin!(events);

        while let Some(item) = inner.next().await {
            match item {
                Ok(event) => {
                    if let Some(legacy) = bridge.translate(event) {
                        yield Ok(LegacyRuntimeEvent {
                            thread_id: thread_id.clone(),
                            run_id: run_id.clone(),
                            agent_name: agent_name.clone(),
                            event: legacy,
                        });
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    };
    Box::pin(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_transform::stream_of;
    use serde_json::json;

    async fn convert(events: Vec<Event>) -> Vec<LegacyEvent> {
        convert_to_legacy_events(stream_of(events), "t".into(), "r".into(), "agent".into())
            .map(|item| item.unwrap().event)
            .collect()
            .await
    }

    #[tokio::test]
    async fn state_deltas_carry_full_state_and_node() {
        let out = convert(vec![
            Event::run_started("t", "r"),
            Event::step_started("plan"),
            Event::state_snapshot(json!({"count": 1})),
            Event::state_delta(vec![json!({"op": "increment", "path": "/count"})]),
            Event::step_finished("plan"),
            Event::run_finished("t", "r", None),
        ])
        .await;

        assert_eq!(out.len(), 3);
        assert_eq!(
            out[1],
            LegacyEvent::AgentStateMessage {
                node_name: Some("plan".into()),
                active: true,
                running: true,
                role: "assistant".into(),
                state: json!({"count": 2}),
            }
        );
        assert_eq!(
            out[2],
            LegacyEvent::AgentStateMessage {
                node_name: None,
                active: false,
                running: false,
                role: "assistant".into(),
                state: json!({"count": 2}),
            }
        );
    }

    #[tokio::test]
    async fn tool_results_remember_action_name() {
        let out = convert(vec![
            Event::tool_call_start("c1", "search", None),
            Event::tool_call_end("c1"),
            Event::tool_call_result("m2", "c1", "found"),
        ])
        .await;
        assert_eq!(
            out.last(),
            Some(&LegacyEvent::ActionExecutionResult {
                action_execution_id: "c1".into(),
                action_name: Some("search".into()),
                result: "found".into(),
            })
        );
    }
}
