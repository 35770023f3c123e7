//! Conformance verification of the event ordering.

use std::collections::HashSet;

use futures::StreamExt;

use crate::error::AgentError;
use crate::events::{Event, EventType};

use super::{EventStream, EventTransform};

/// Rejects structurally invalid event orderings.
pub struct VerifyTransform {
    debug: bool,
}

impl VerifyTransform {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl EventTransform for VerifyTransform {
    fn transform(&self, stream: EventStream) -> EventStream {
        let debug = self.debug;
        let transformed = async_stream::stream! {
            let mut verifier = Verifier::default();
            let mut inner = std::pin::pin!(stream);

            while let Some(item) = inner.next().await {
                match item {
                    Ok(event) => {
                        if debug {
                            tracing::debug!(event_type = %event.event_type(), "verify event");
                        }
                        if let Err(e) = verifier.check(&event) {
                            tracing::warn!(error = %e, "event stream rejected");
                            yield Err(e);
                            return;
                        }
                        yield Ok(event);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if let Err(e) = verifier.finish() {
                tracing::warn!(error = %e, "event stream rejected");
                yield Err(e);
            }
        };
        Box::pin(transformed)
    }
}

/// Ordering state for one stream.
#[derive(Debug, Default)]
pub(crate) struct Verifier {
    run_started: bool,
    run_finished: bool,
    run_errored: bool,
    active_message: Option<String>,
    active_tool_call: Option<String>,
    active_steps: HashSet<String>,
}

impl Verifier {
    pub(crate) fn check(&mut self, event: &Event) -> Result<(), AgentError> {
        let event_type = event.event_type();

        if self.run_errored {
            return Err(violation(format!(
                "Cannot send event type '{event_type}': the run has already errored with RUN_ERROR"
            )));
        }
        if self.run_finished && event_type != EventType::RunError {
            return Err(violation(format!(
                "Cannot send event type '{event_type}': the run has already finished with RUN_FINISHED"
            )));
        }
        if !self.run_started && !matches!(event_type, EventType::RunStarted | EventType::RunError) {
            return Err(violation(format!(
                "First event must be 'RUN_STARTED', got '{event_type}'"
            )));
        }

        if let Some(message_id) = &self.active_message {
            let allowed = match event {
                Event::TextMessageContent(e) => {
                    check_id(event_type, message_id, &e.message_id)?;
                    true
                }
                Event::TextMessageEnd(e) => {
                    check_id(event_type, message_id, &e.message_id)?;
                    true
                }
                Event::Raw(_) => true,
                _ => false,
            };
            if !allowed {
                return Err(violation(format!(
                    "Cannot send event type '{event_type}' after TEXT_MESSAGE_START: send TEXT_MESSAGE_END first"
                )));
            }
        }

        if let Some(tool_call_id) = &self.active_tool_call {
            let allowed = match event {
                Event::ToolCallArgs(e) => {
                    check_id(event_type, tool_call_id, &e.tool_call_id)?;
                    true
                }
                Event::ToolCallEnd(e) => {
                    check_id(event_type, tool_call_id, &e.tool_call_id)?;
                    true
                }
                Event::Raw(_) => true,
                _ => false,
            };
            if !allowed {
                return Err(violation(format!(
                    "Cannot send event type '{event_type}' after TOOL_CALL_START: send TOOL_CALL_END first"
                )));
            }
        }

        match event {
            Event::RunStarted(_) => {
                if self.run_started {
                    return Err(violation("Cannot send multiple RUN_STARTED events"));
                }
                self.run_started = true;
            }
            Event::RunFinished(_) => {
                if !self.active_steps.is_empty() {
                    let mut open: Vec<&str> = self.active_steps.iter().map(String::as_str).collect();
                    open.sort_unstable();
                    return Err(violation(format!(
                        "Cannot send RUN_FINISHED while steps are still active: {}",
                        open.join(", ")
                    )));
                }
                self.run_finished = true;
            }
            Event::RunError(_) => {
                self.run_errored = true;
            }
            Event::StepStarted(e) => {
                if !self.active_steps.insert(e.step_name.clone()) {
                    return Err(violation(format!(
                        "Step \"{}\" is already active",
                        e.step_name
                    )));
                }
            }
            Event::StepFinished(e) => {
                if !self.active_steps.remove(&e.step_name) {
                    return Err(violation(format!(
                        "Cannot send STEP_FINISHED for step \"{}\" that was not started",
                        e.step_name
                    )));
                }
            }
            Event::TextMessageStart(e) => {
                self.active_message = Some(e.message_id.clone());
            }
            Event::TextMessageContent(_) | Event::TextMessageEnd(_)
                if self.active_message.is_none() =>
            {
                return Err(violation(format!(
                    "Cannot send '{event_type}' event: no active text message found"
                )));
            }
            Event::TextMessageEnd(_) => {
                self.active_message = None;
            }
            Event::ToolCallStart(e) => {
                self.active_tool_call = Some(e.tool_call_id.clone());
            }
            Event::ToolCallArgs(_) | Event::ToolCallEnd(_) if self.active_tool_call.is_none() => {
                return Err(violation(format!(
                    "Cannot send '{event_type}' event: no active tool call found"
                )));
            }
            Event::ToolCallEnd(_) => {
                self.active_tool_call = None;
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn finish(&self) -> Result<(), AgentError> {
        if self.run_finished || self.run_errored {
            return Ok(());
        }
        Err(violation(
            "Event stream completed without RUN_FINISHED or RUN_ERROR",
        ))
    }
}

fn check_id(event_type: EventType, expected: &str, actual: &str) -> Result<(), AgentError> {
    if expected == actual {
        Ok(())
    } else {
        Err(violation(format!(
            "Cannot send '{event_type}' event: id ({actual}) does not match the active id ({expected})"
        )))
    }
}

fn violation(message: impl Into<String>) -> AgentError {
    AgentError::protocol(message)
}
