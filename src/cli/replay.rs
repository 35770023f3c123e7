//! `cadence replay`: run a recorded event stream through an agent.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};

use crate::agent::{Agent, ReplayProducer};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::legacy::LegacyRuntimeEvent;
use crate::subscriber::LoggingSubscriber;
use crate::types::RunAgentParameters;

use super::ReplayArgs;

/// Replay `args.events` and print the outcome as JSON on stdout.
pub async fn handle_replay(args: ReplayArgs) -> Result<(), AgentError> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::from_env(),
    };
    config.debug |= args.debug;

    let producer = ReplayProducer::from_path(&args.events).await?;
    tracing::info!(
        path = %args.events.display(),
        events = producer.events().len(),
        "loaded recording"
    );
    let agent = Agent::new(producer, config);

    if args.legacy {
        for event in replay_legacy(&agent).await? {
            println!("{}", serde_json::to_string(&event)?);
        }
        return Ok(());
    }

    let timeout = args.timeout_ms.map(Duration::from_millis);
    let output = replay(&agent, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run the agent once and summarize the outcome.
///
/// With a `timeout` the run is aborted when it elapses; finalization hooks
/// still run and the error is [`AgentError::Timeout`].
pub(crate) async fn replay(agent: &Agent, timeout: Option<Duration>) -> Result<Value, AgentError> {
    let _logging = agent.subscribe(Arc::new(LoggingSubscriber::new()));
    let params = RunAgentParameters::default();
    let result = match timeout {
        Some(timeout) => agent.run_agent_with_timeout(params, None, timeout).await?,
        None => agent.run_agent(params, None).await?,
    };

    Ok(json!({
        "threadId": agent.thread_id(),
        "result": result.result,
        "newMessages": result.new_messages,
        "messages": agent.messages().await,
        "state": agent.state().await,
    }))
}

pub(crate) async fn replay_legacy(agent: &Agent) -> Result<Vec<LegacyRuntimeEvent>, AgentError> {
    let mut events = agent.run_agent_bridged(RunAgentParameters::default()).await;
    let mut out = Vec::new();
    while let Some(item) = events.next().await {
        out.push(item?);
    }
    Ok(out)
}
