//! Shared test helpers: scripted producer and recording subscriber.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cadence::error::AgentError;
use cadence::events::Event;
use cadence::stream_transform::EventStream;
use cadence::subscriber::{AgentSubscriber, HookResult, StateMutation, SubscriberParams};
use cadence::agent::EventProducer;
use cadence::types::{Message, RunAgentInput, ToolCall};

/// One scripted stream item.
pub enum Step {
    Emit(Event),
    Fail(String),
    /// Never yield again (until the run is aborted).
    Hang,
}

/// A producer that plays back a script and records the inputs it received.
pub struct ScriptedProducer {
    script: Mutex<Vec<Step>>,
    inputs: Arc<Mutex<Vec<RunAgentInput>>>,
}

impl ScriptedProducer {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(events: Vec<Event>) -> Self {
        Self::new(events.into_iter().map(Step::Emit).collect())
    }

    pub fn inputs(&self) -> Arc<Mutex<Vec<RunAgentInput>>> {
        Arc::clone(&self.inputs)
    }
}

impl EventProducer for ScriptedProducer {
    fn run(&self, input: RunAgentInput) -> EventStream {
        self.inputs.lock().unwrap().push(input);
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        Box::pin(async_stream::stream! {
            for step in script {
                match step {
                    Step::Emit(event) => yield Ok(event),
                    Step::Fail(message) => {
                        yield Err(AgentError::producer(message));
                        return;
                    }
                    Step::Hang => futures::future::pending::<()>().await,
                }
            }
        })
    }
}

/// `RUN_STARTED`, one text message assembled from `parts`, `RUN_FINISHED`.
pub fn text_run(message_id: &str, parts: &[&str]) -> Vec<Event> {
    let mut events = vec![
        Event::run_started("thread", "run"),
        Event::text_message_start(message_id),
    ];
    events.extend(parts.iter().map(|p| Event::text_message_content(message_id, *p)));
    events.push(Event::text_message_end(message_id));
    events.push(Event::run_finished("thread", "run", None));
    events
}

/// Records every hook it sees as a short label.
#[derive(Clone, Default)]
pub struct RecordingSubscriber {
    calls: Arc<Mutex<Vec<String>>>,
    /// Swallow run failures via `stop_propagation`.
    pub swallow_errors: bool,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn swallowing() -> Self {
        Self {
            swallow_errors: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == label).count()
    }

    pub fn saw(&self, label: &str) -> bool {
        self.count(label) > 0
    }

    fn record(&self, label: impl Into<String>) {
        self.calls.lock().unwrap().push(label.into());
    }
}

#[async_trait]
impl AgentSubscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_run_initialized(&self, _params: SubscriberParams) -> HookResult {
        self.record("initialized");
        Ok(None)
    }

    async fn on_run_failed(&self, error: &AgentError, _params: SubscriberParams) -> HookResult {
        self.record(format!("failed:{}", error.category()));
        Ok(self.swallow_errors.then(|| StateMutation::new().stop()))
    }

    async fn on_run_finalized(&self, _params: SubscriberParams) -> HookResult {
        self.record("finalized");
        Ok(None)
    }

    async fn on_event(&self, event: &Event, _params: SubscriberParams) -> HookResult {
        self.record(format!("event:{}", event.event_type()));
        Ok(None)
    }

    async fn on_messages_changed(&self, _params: SubscriberParams) {
        self.record("messages_changed");
    }

    async fn on_state_changed(&self, _params: SubscriberParams) {
        self.record("state_changed");
    }

    async fn on_new_message(&self, message: &Message, _params: SubscriberParams) {
        self.record(format!("new_message:{}", message.id));
    }

    async fn on_new_tool_call(&self, tool_call: &ToolCall, _params: SubscriberParams) {
        self.record(format!("new_tool_call:{}", tool_call.id));
    }
}
