//! Legacy protocol bridge tests.

#![cfg(feature = "legacy")]

mod common;

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use cadence::agent::{Agent, ReplayProducer};
use cadence::config::AgentConfig;
use cadence::events::Event;
use cadence::legacy::{LegacyEvent, LegacyRuntimeEvent};
use cadence::types::RunAgentParameters;

use common::{RecordingSubscriber, ScriptedProducer, Step};

fn transcript() -> Vec<Event> {
    vec![
        Event::run_started("thread", "run"),
        Event::step_started("lookup"),
        Event::text_message_start("m1"),
        Event::text_message_content("m1", "Checking"),
        Event::text_message_end("m1"),
        Event::tool_call_start("c1", "weather", Some("m1".into())),
        Event::tool_call_args("c1", "{\"city\":\"Oslo\"}"),
        Event::tool_call_end("c1"),
        Event::tool_call_result("m2", "c1", "sunny"),
        Event::state_delta(vec![json!({"op": "add", "path": "/city", "value": "Oslo"})]),
        Event::step_finished("lookup"),
        Event::custom("progress", json!(100)),
        Event::run_finished("thread", "run", None),
    ]
}

#[tokio::test]
async fn bridged_run_translates_in_order() {
    let agent = Agent::new(
        ReplayProducer::new(transcript()),
        AgentConfig::builder()
            .agent_id("weather-agent".to_string())
            .thread_id("thread-1".to_string())
            .build(),
    );
    let recorder = RecordingSubscriber::new();
    let _sub = agent.subscribe(Arc::new(recorder.clone()));

    let events: Vec<LegacyRuntimeEvent> = agent
        .run_agent_bridged(
            RunAgentParameters::builder()
                .run_id("run-1".to_string())
                .build(),
        )
        .await
        .map(|item| item.unwrap())
        .collect()
        .await;

    let kinds: Vec<&str> = events.iter().map(|e| e.event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "TextMessageStart",
            "TextMessageContent",
            "TextMessageEnd",
            "ActionExecutionStart",
            "ActionExecutionArgs",
            "ActionExecutionEnd",
            "ActionExecutionResult",
            "AgentStateMessage",
            "MetaEvent",
            "AgentStateMessage",
        ]
    );
    assert!(events.iter().all(|e| e.thread_id == "thread-1"
        && e.run_id == "run-1"
        && e.agent_name == "weather-agent"));
    assert_eq!(
        events[7].event,
        LegacyEvent::AgentStateMessage {
            node_name: Some("lookup".into()),
            active: true,
            running: true,
            role: "assistant".into(),
            state: json!({"city": "Oslo"}),
        }
    );

    // Bridged runs leave the canonical data and subscribers alone.
    assert!(agent.messages().await.is_empty());
    assert_eq!(agent.state().await, json!({}));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn bridged_run_surfaces_producer_errors() {
    let agent = Agent::new(
        ScriptedProducer::new(vec![
            Step::Emit(Event::run_started("thread", "run")),
            Step::Emit(Event::text_message_start("m1")),
            Step::Fail("upstream gone".into()),
        ]),
        AgentConfig::default(),
    );

    let items: Vec<_> = agent
        .run_agent_bridged(RunAgentParameters::default())
        .await
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].as_ref().is_err_and(|e| e.to_string() == "Producer error: upstream gone"));
}

#[tokio::test]
async fn bridged_run_error_becomes_legacy_run_error() {
    let agent = Agent::new(
        ReplayProducer::new(vec![
            Event::run_started("thread", "run"),
            Event::run_error("quota exceeded", Some("429".into())),
        ]),
        AgentConfig::default(),
    );

    let events: Vec<_> = agent
        .run_agent_bridged(RunAgentParameters::default())
        .await
        .map(|item| item.unwrap().event)
        .collect()
        .await;

    assert_eq!(
        events,
        vec![LegacyEvent::RunError {
            message: "quota exceeded".into(),
            code: Some("429".into()),
        }]
    );
}
