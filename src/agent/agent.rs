//! The long-lived agent: canonical transcript and state plus subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::stream_transform::TransformPipeline;
use crate::subscriber::{AgentInfo, AgentSubscriber};
use crate::types::{Message, RunAgentInput, RunAgentParameters, RunAgentResult, State};

use super::controller::RunController;
use super::producer::EventProducer;

type SubscriberList = RwLock<Vec<(u64, Arc<dyn AgentSubscriber>)>>;
type ActiveRunSlot = std::sync::Mutex<Option<CancellationToken>>;

/// Holds the abort token of the running run; empties the slot when the run
/// completes or its future is dropped.
struct ActiveRun<'a> {
    slot: &'a ActiveRunSlot,
}

impl<'a> ActiveRun<'a> {
    fn register(slot: &'a ActiveRunSlot, token: CancellationToken) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Self { slot }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Owner of canonical `messages` and `state` across sequential runs.
///
/// All public methods take `&self`; canonical data sits behind async
/// mutexes so a run and observers can share one handle. Runs on the same
/// agent are not serialized: callers should await one run before starting
/// the next, or [`fork`](Self::fork) an independent agent.
///
/// # Example
///
/// ```
/// use cadence::agent::{Agent, ReplayProducer};
/// use cadence::config::AgentConfig;
/// use cadence::events::Event;
/// use cadence::types::RunAgentParameters;
///
/// # #[tokio::main]
/// # async fn main() {
/// let producer = ReplayProducer::new(vec![
///     Event::run_started("t", "r"),
///     Event::text_message_start("m1"),
///     Event::text_message_content("m1", "Hello"),
///     Event::text_message_end("m1"),
///     Event::run_finished("t", "r", None),
/// ]);
/// let agent = Agent::new(producer, AgentConfig::default());
/// let result = agent.run_agent(RunAgentParameters::default(), None).await.unwrap();
/// assert_eq!(result.new_messages[0].text(), "Hello");
/// # }
/// ```
pub struct Agent {
    pub(super) producer: Arc<dyn EventProducer>,
    pub(super) pipeline: Arc<TransformPipeline>,
    agent_id: String,
    description: Option<String>,
    thread_id: String,
    debug: bool,
    pub(super) messages: Arc<Mutex<Vec<Message>>>,
    pub(super) state: Arc<Mutex<State>>,
    subscribers: Arc<SubscriberList>,
    next_subscriber_id: Arc<AtomicU64>,
    active_run: Arc<ActiveRunSlot>,
}

impl Agent {
    /// Create an agent around `producer`. Missing ids are generated.
    pub fn new(producer: impl EventProducer + 'static, config: AgentConfig) -> Self {
        Self::from_shared(Arc::new(producer), config)
    }

    /// Create an agent around an already shared producer.
    pub fn from_shared(producer: Arc<dyn EventProducer>, config: AgentConfig) -> Self {
        let AgentConfig {
            agent_id,
            description,
            thread_id,
            initial_messages,
            initial_state,
            debug,
        } = config;

        Self {
            producer,
            pipeline: Arc::new(TransformPipeline::standard(debug)),
            agent_id: agent_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            description,
            thread_id: thread_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            debug,
            messages: Arc::new(Mutex::new(initial_messages)),
            state: Arc::new(Mutex::new(
                initial_state.unwrap_or_else(|| Value::Object(Map::new())),
            )),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
            active_run: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Replace the stream transform stages (default: de-chunk then verify).
    pub fn with_pipeline(mut self, pipeline: TransformPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Read-only identity snapshot handed to subscribers.
    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            agent_id: self.agent_id.clone(),
            thread_id: self.thread_id.clone(),
            description: self.description.clone(),
        }
    }

    /// Copy of the canonical transcript.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Copy of the canonical state.
    pub async fn state(&self) -> State {
        self.state.lock().await.clone()
    }

    /// Register a persistent subscriber. Subscribers run in registration order.
    pub fn subscribe(&self, subscriber: Arc<dyn AgentSubscriber>) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub(super) fn registered_subscribers(&self) -> Vec<Arc<dyn AgentSubscriber>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }

    /// Execute one run.
    ///
    /// `subscriber`, if given, runs after all persistent subscribers for this
    /// run only. Finalization hooks run exactly once whether the run
    /// succeeds, fails, or is aborted.
    ///
    /// # Errors
    ///
    /// Returns the producer, protocol, `RUN_ERROR`, or abort error unless an
    /// `on_run_failed` hook requested `stop_propagation`.
    pub async fn run_agent(
        &self,
        params: RunAgentParameters,
        subscriber: Option<Arc<dyn AgentSubscriber>>,
    ) -> Result<RunAgentResult, AgentError> {
        let cancel = CancellationToken::new();
        let _active = ActiveRun::register(&self.active_run, cancel.clone());

        RunController::new(self, subscriber)
            .execute(params, cancel)
            .await
    }

    /// Execute one run, aborting it once `timeout` elapses.
    ///
    /// Unlike wrapping [`run_agent`](Self::run_agent) in a timeout, the run
    /// is aborted and awaited, so its failure and finalization hooks still
    /// run. A run that is cut off returns [`AgentError::Timeout`].
    pub async fn run_agent_with_timeout(
        &self,
        params: RunAgentParameters,
        subscriber: Option<Arc<dyn AgentSubscriber>>,
        timeout: Duration,
    ) -> Result<RunAgentResult, AgentError> {
        let mut run = std::pin::pin!(self.run_agent(params, subscriber));
        tokio::select! {
            biased;
            outcome = &mut run => return outcome,
            _ = tokio::time::sleep(timeout) => {}
        }

        let timeout_ms = timeout.as_millis() as u64;
        let aborted = self.abort_run().await;
        tracing::warn!(agent_id = %self.agent_id, timeout_ms, "run timed out");
        match run.await {
            Err(AgentError::Aborted) if aborted => Err(AgentError::Timeout(timeout_ms)),
            outcome => outcome,
        }
    }

    /// Cancel the active run.
    ///
    /// Returns `false` when no run is in progress. The run ends with
    /// [`AgentError::Aborted`] after its failure and finalization hooks.
    pub async fn abort_run(&self) -> bool {
        match self
            .active_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                tracing::debug!(agent_id = %self.agent_id, "run abort requested");
                true
            }
            _ => false,
        }
    }

    /// Build the run input from canonical data.
    pub(super) async fn prepare_input(&self, params: RunAgentParameters) -> RunAgentInput {
        RunAgentInput {
            thread_id: self.thread_id.clone(),
            run_id: params
                .run_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            state: self.state.lock().await.clone(),
            messages: self.messages.lock().await.clone(),
            tools: params.tools,
            context: params.context,
            forwarded_props: params
                .forwarded_props
                .unwrap_or_else(|| Value::Object(Map::new())),
        }
    }

    /// Independent agent with copies of the canonical data, sharing the
    /// producer, transform stages, and current subscribers.
    pub async fn fork(&self) -> Agent {
        let subscribers: Vec<_> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Agent {
            producer: Arc::clone(&self.producer),
            pipeline: Arc::clone(&self.pipeline),
            agent_id: self.agent_id.clone(),
            description: self.description.clone(),
            thread_id: self.thread_id.clone(),
            debug: self.debug,
            messages: Arc::new(Mutex::new(self.messages().await)),
            state: Arc::new(Mutex::new(self.state().await)),
            next_subscriber_id: Arc::new(AtomicU64::new(
                self.next_subscriber_id.load(Ordering::Relaxed),
            )),
            subscribers: Arc::new(RwLock::new(subscribers)),
            active_run: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Run the producer and translate its events into the legacy protocol.
    ///
    /// Events pass through the transform stages but are not applied to the
    /// canonical transcript or state, and no subscriber is invoked.
    #[cfg(feature = "legacy")]
    pub async fn run_agent_bridged(
        &self,
        params: RunAgentParameters,
    ) -> crate::legacy::LegacyEventStream {
        let input = self.prepare_input(params).await;
        let run_id = input.run_id.clone();
        let events = self.pipeline.apply(self.producer.run(input));
        let converted = crate::legacy::convert_to_legacy_events(
            events,
            self.thread_id.clone(),
            run_id,
            self.agent_id.clone(),
        );
        if !self.debug {
            return converted;
        }
        Box::pin(futures::StreamExt::inspect(converted, |item| {
            if let Ok(event) = item {
                tracing::debug!(
                    event = %serde_json::to_string(event).unwrap_or_default(),
                    "legacy event"
                );
            }
        }))
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("agent_id", &self.agent_id)
            .field("thread_id", &self.thread_id)
            .field("description", &self.description)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`Agent::subscribe`].
///
/// Dropping the handle keeps the subscriber registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl Subscription {
    /// Remove the subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return false;
        };
        let mut list = subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.retain(|(id, _)| *id != self.id);
        list.len() != before
    }
}
