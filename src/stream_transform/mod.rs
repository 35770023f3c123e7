//! Stream transformations applied to a producer's raw event stream.
//!
//! Stages run in order before any event is interpreted. Each stage must
//! preserve event order; an `Err` item ends the stream.

pub mod chunks;
pub mod verify;

pub use chunks::ChunkTransform;
pub use verify::VerifyTransform;

use futures::stream::BoxStream;

use crate::error::AgentError;
use crate::events::Event;

/// A producer's event stream.
pub type EventStream = BoxStream<'static, Result<Event, AgentError>>;

/// Trait for transforming an event stream.
pub trait EventTransform: Send + Sync {
    /// Transform the stream.
    fn transform(&self, stream: EventStream) -> EventStream;
}

/// Ordered list of transform stages.
#[derive(Default)]
pub struct TransformPipeline {
    stages: Vec<Box<dyn EventTransform>>,
}

impl TransformPipeline {
    /// An empty pipeline (events pass through untouched).
    pub fn new() -> Self {
        Self::default()
    }

    /// De-chunking followed by conformance verification.
    pub fn standard(debug: bool) -> Self {
        Self::new()
            .with_stage(ChunkTransform::new(debug))
            .with_stage(VerifyTransform::new(debug))
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: impl EventTransform + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `stream` through every stage in order.
    pub fn apply(&self, stream: EventStream) -> EventStream {
        self.stages
            .iter()
            .fold(stream, |stream, stage| stage.transform(stream))
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// Convert a list of events into an [`EventStream`].
pub fn stream_of(events: Vec<Event>) -> EventStream {
    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
}
