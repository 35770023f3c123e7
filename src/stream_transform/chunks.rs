//! De-chunking: expands `*_CHUNK` fragments into start/content/end triples.

use futures::StreamExt;

use crate::error::AgentError;
use crate::events::{Event, TextMessageChunkEvent, ToolCallChunkEvent};
use crate::types::Role;

use super::{EventStream, EventTransform};

/// Reassembles partial text and tool-call fragments into explicit events.
pub struct ChunkTransform {
    debug: bool,
}

impl ChunkTransform {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

/// Entity currently opened by a chunk.
enum OpenChunk {
    Text { message_id: String },
    ToolCall { tool_call_id: String },
}

impl OpenChunk {
    fn close(self) -> Event {
        match self {
            Self::Text { message_id } => Event::text_message_end(message_id),
            Self::ToolCall { tool_call_id } => Event::tool_call_end(tool_call_id),
        }
    }
}

impl EventTransform for ChunkTransform {
    fn transform(&self, stream: EventStream) -> EventStream {
        let debug = self.debug;
        let transformed = async_stream::stream! {
            let mut open: Option<OpenChunk> = None;
            let mut inner = std::pin::pin!(stream);

            while let Some(item) = inner.next().await {
                let event = match item {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if debug {
                    tracing::debug!(event_type = %event.event_type(), "chunk transform input");
                }
                match event {
                    Event::TextMessageChunk(chunk) => {
                        match expand_text_chunk(&mut open, chunk) {
                            Ok(events) => {
                                for event in events {
                                    yield Ok(event);
                                }
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                    Event::ToolCallChunk(chunk) => {
                        match expand_tool_call_chunk(&mut open, chunk) {
                            Ok(events) => {
                                for event in events {
                                    yield Ok(event);
                                }
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                    other => {
                        if let Some(chunk) = open.take() {
                            yield Ok(chunk.close());
                        }
                        yield Ok(other);
                    }
                }
            }

            if let Some(chunk) = open.take() {
                yield Ok(chunk.close());
            }
        };
        Box::pin(transformed)
    }
}

fn expand_text_chunk(
    open: &mut Option<OpenChunk>,
    chunk: TextMessageChunkEvent,
) -> Result<Vec<Event>, AgentError> {
    let mut events = Vec::new();
    let continues = match (open.as_ref(), chunk.message_id.as_deref()) {
        (Some(OpenChunk::Text { message_id }), Some(id)) => message_id == id,
        (Some(OpenChunk::Text { .. }), None) => true,
        _ => false,
    };

    if !continues {
        let Some(message_id) = chunk.message_id.clone() else {
            return Err(AgentError::protocol(
                "first TEXT_MESSAGE_CHUNK must carry a messageId",
            ));
        };
        if let Some(previous) = open.take() {
            events.push(previous.close());
        }
        let mut start = Event::text_message_start(message_id.clone());
        if let Event::TextMessageStart(ref mut e) = start {
            e.role = chunk.role.unwrap_or(Role::Assistant);
        }
        events.push(start);
        *open = Some(OpenChunk::Text { message_id });
    }

    if let (Some(OpenChunk::Text { message_id }), Some(delta)) = (open.as_ref(), chunk.delta) {
        if !delta.is_empty() {
            events.push(Event::text_message_content(message_id.clone(), delta));
        }
    }
    Ok(events)
}

fn expand_tool_call_chunk(
    open: &mut Option<OpenChunk>,
    chunk: ToolCallChunkEvent,
) -> Result<Vec<Event>, AgentError> {
    let mut events = Vec::new();
    let continues = match (open.as_ref(), chunk.tool_call_id.as_deref()) {
        (Some(OpenChunk::ToolCall { tool_call_id }), Some(id)) => tool_call_id == id,
        (Some(OpenChunk::ToolCall { .. }), None) => true,
        _ => false,
    };

    if !continues {
        let (Some(tool_call_id), Some(tool_call_name)) =
            (chunk.tool_call_id.clone(), chunk.tool_call_name.clone())
        else {
            return Err(AgentError::protocol(
                "first TOOL_CALL_CHUNK must carry toolCallId and toolCallName",
            ));
        };
        if let Some(previous) = open.take() {
            events.push(previous.close());
        }
        events.push(Event::tool_call_start(
            tool_call_id.clone(),
            tool_call_name,
            chunk.parent_message_id.clone(),
        ));
        *open = Some(OpenChunk::ToolCall { tool_call_id });
    }

    if let (Some(OpenChunk::ToolCall { tool_call_id }), Some(delta)) = (open.as_ref(), chunk.delta)
    {
        if !delta.is_empty() {
            events.push(Event::tool_call_args(tool_call_id.clone(), delta));
        }
    }
    Ok(events)
}
