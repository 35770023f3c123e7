//! Event producers: the backends that drive a run.

use std::path::Path;

use crate::apply::{DefaultReducer, Reducer};
use crate::error::AgentError;
use crate::events::Event;
use crate::stream_transform::{stream_of, EventStream};
use crate::types::RunAgentInput;

/// Source of a run's events.
///
/// A producer receives the full run input and returns a stream that ends
/// with exactly one `RUN_FINISHED` or `RUN_ERROR` event, or with an `Err`
/// item in place of a clean terminal event.
pub trait EventProducer: Send + Sync {
    fn run(&self, input: RunAgentInput) -> EventStream;

    /// Fresh reducer for one run. Override to customise how events become
    /// mutations.
    fn reducer(&self) -> Box<dyn Reducer> {
        Box::new(DefaultReducer::new())
    }
}

/// Replays a recorded event list, ignoring the run input.
#[derive(Debug, Clone, Default)]
pub struct ReplayProducer {
    events: Vec<Event>,
}

impl ReplayProducer {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Parse a JSON-lines recording: one event per line. Blank lines and
    /// lines starting with `#` are skipped.
    ///
    /// ```
    /// use cadence::agent::ReplayProducer;
    ///
    /// let replay = ReplayProducer::from_jsonl_str(
    ///     r#"{"type":"RUN_STARTED","threadId":"t","runId":"r"}
    /// {"type":"RUN_FINISHED","threadId":"t","runId":"r"}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(replay.events().len(), 2);
    /// ```
    pub fn from_jsonl_str(raw: &str) -> Result<Self, AgentError> {
        let mut events = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|e| {
                AgentError::producer(format!("invalid event on line {}: {e}", index + 1))
            })?;
            events.push(event);
        }
        Ok(Self { events })
    }

    /// Load a JSON-lines recording from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_jsonl_str(&raw)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl EventProducer for ReplayProducer {
    fn run(&self, input: RunAgentInput) -> EventStream {
        tracing::debug!(
            run_id = %input.run_id,
            events = self.events.len(),
            "replaying recorded events"
        );
        stream_of(self.events.clone())
    }
}
