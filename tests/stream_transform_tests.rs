//! Tests for stream transforms.

use futures::StreamExt;
use pretty_assertions::assert_eq;

use cadence::error::AgentError;
use cadence::events::{Event, EventType};
use cadence::stream_transform::{stream_of, EventStream, EventTransform, TransformPipeline};

async fn collect(stream: EventStream) -> Vec<Result<Event, AgentError>> {
    stream.collect().await
}

fn types(items: &[Result<Event, AgentError>]) -> Vec<EventType> {
    items
        .iter()
        .filter_map(|item| item.as_ref().ok())
        .map(Event::event_type)
        .collect()
}

#[tokio::test]
async fn standard_pipeline_expands_chunks_and_verifies() {
    let pipeline = TransformPipeline::standard(false);
    let items = collect(pipeline.apply(stream_of(vec![
        Event::run_started("t", "r"),
        Event::tool_call_chunk(Some("c1".into()), Some("search".into()), None, Some("{\"q\":".into())),
        Event::tool_call_chunk(None, None, None, Some("1}".into())),
        Event::run_finished("t", "r", None),
    ])))
    .await;

    assert!(items.iter().all(Result::is_ok));
    assert_eq!(
        types(&items),
        vec![
            EventType::RunStarted,
            EventType::ToolCallStart,
            EventType::ToolCallArgs,
            EventType::ToolCallArgs,
            EventType::ToolCallEnd,
            EventType::RunFinished,
        ]
    );
}

#[tokio::test]
async fn standard_pipeline_rejects_content_before_start() {
    let pipeline = TransformPipeline::standard(false);
    let items = collect(pipeline.apply(stream_of(vec![
        Event::run_started("t", "r"),
        Event::text_message_content("m1", "orphan"),
        Event::run_finished("t", "r", None),
    ])))
    .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(&items[1], Err(e) if e.is_protocol_violation()));
}

#[tokio::test]
async fn standard_pipeline_rejects_events_after_finish() {
    let pipeline = TransformPipeline::standard(false);
    let items = collect(pipeline.apply(stream_of(vec![
        Event::run_started("t", "r"),
        Event::run_finished("t", "r", None),
        Event::text_message_start("m1"),
    ])))
    .await;

    assert!(matches!(items.last(), Some(Err(e)) if e.is_protocol_violation()));
}

#[tokio::test]
async fn upstream_errors_end_the_stream() {
    let upstream: EventStream = Box::pin(futures::stream::iter(vec![
        Ok(Event::run_started("t", "r")),
        Err(AgentError::producer("socket closed")),
        Ok(Event::run_finished("t", "r", None)),
    ]));
    let items = collect(TransformPipeline::standard(false).apply(upstream)).await;

    assert_eq!(items.len(), 2);
    assert!(matches!(&items[1], Err(AgentError::Producer(m)) if m == "socket closed"));
}

/// Drops `CUSTOM` events.
struct DropCustom;

impl EventTransform for DropCustom {
    fn transform(&self, stream: EventStream) -> EventStream {
        Box::pin(stream.filter(|item| {
            let keep = !matches!(item, Ok(Event::Custom(_)));
            futures::future::ready(keep)
        }))
    }
}

#[tokio::test]
async fn custom_stages_run_in_order() {
    let pipeline = TransformPipeline::new()
        .with_stage(DropCustom)
        .with_stage(cadence::stream_transform::VerifyTransform::new(false));
    assert_eq!(pipeline.len(), 2);

    let items = collect(pipeline.apply(stream_of(vec![
        Event::run_started("t", "r"),
        Event::custom("progress", serde_json::json!(50)),
        Event::run_finished("t", "r", None),
    ])))
    .await;

    assert_eq!(types(&items), vec![EventType::RunStarted, EventType::RunFinished]);
}

#[tokio::test]
async fn empty_pipeline_passes_events_through() {
    let pipeline = TransformPipeline::new();
    assert!(pipeline.is_empty());

    let items = collect(pipeline.apply(stream_of(vec![Event::text_message_start("m1")]))).await;
    assert_eq!(types(&items), vec![EventType::TextMessageStart]);
}
