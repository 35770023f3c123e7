//! Execution of a single run.
//!
//! A run moves through [`RunPhase`]s strictly in sequence: each event is
//! reduced, passed through the subscriber chain, and committed before the
//! next event is pulled from the producer. Whatever happens in between,
//! the finalization chain runs exactly once before the run returns.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use strum::Display;
use tokio_util::sync::CancellationToken;

use crate::apply::{Reducer, Reduction};
use crate::error::AgentError;
use crate::events::Event;
use crate::stream_transform::EventStream;
use crate::subscriber::chain::panic_message;
use crate::subscriber::{
    notify_subscribers, run_subscribers_with_mutation, AgentSubscriber, Hook, Notification,
    RunScope, StateMutation,
};
use crate::types::{Message, RunAgentInput, RunAgentParameters, RunAgentResult, State};

use super::agent::Agent;
use super::capture::ResultCapture;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Initializing,
    Streaming,
    Applying,
    Committing,
    Erroring,
    Finalizing,
}

pub(crate) struct RunController<'a> {
    agent: &'a Agent,
    subscribers: Vec<Arc<dyn AgentSubscriber>>,
    capture: Arc<ResultCapture>,
    phase: RunPhase,
    run_id: String,
}

impl<'a> RunController<'a> {
    /// Order: result capture, persistent subscribers, per-call subscriber.
    pub(crate) fn new(agent: &'a Agent, per_call: Option<Arc<dyn AgentSubscriber>>) -> Self {
        let capture = Arc::new(ResultCapture::default());
        let mut subscribers: Vec<Arc<dyn AgentSubscriber>> = Vec::new();
        subscribers.push(capture.clone());
        subscribers.extend(agent.registered_subscribers());
        subscribers.extend(per_call);
        Self {
            agent,
            subscribers,
            capture,
            phase: RunPhase::Idle,
            run_id: String::new(),
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        if self.phase != phase {
            tracing::debug!(run_id = %self.run_id, from = %self.phase, to = %phase, "run phase");
            self.phase = phase;
        }
    }

    pub(crate) async fn execute(
        mut self,
        params: RunAgentParameters,
        cancel: CancellationToken,
    ) -> Result<RunAgentResult, AgentError> {
        let input = self.agent.prepare_input(params).await;
        self.run_id = input.run_id.clone();
        self.enter(RunPhase::Initializing);
        tracing::info!(
            run_id = %self.run_id,
            thread_id = %input.thread_id,
            agent_id = %self.agent.agent_id(),
            subscribers = self.subscribers.len(),
            "starting run"
        );

        let scope = self.initialize(input).await;

        let streamed = AssertUnwindSafe(self.stream(&scope, &cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(AgentError::producer(format!(
                    "run panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        let outcome = match streamed {
            Ok(()) => Ok(()),
            Err(error) => self.fail(error, &scope).await,
        };

        self.enter(RunPhase::Finalizing);
        let finalized = self.run_chain(&Hook::RunFinalized, &scope).await;
        self.commit(finalized, &scope).await;
        self.enter(RunPhase::Idle);

        outcome?;
        let known: HashSet<&str> = scope.input.messages.iter().map(|m| m.id.as_str()).collect();
        let new_messages = self
            .agent
            .messages()
            .await
            .into_iter()
            .filter(|m| !known.contains(m.id.as_str()))
            .collect();
        tracing::info!(run_id = %self.run_id, "run completed");
        Ok(RunAgentResult {
            result: self.capture.take(),
            new_messages,
        })
    }

    /// Run the initialization chain. Replacements become both the canonical
    /// data and the input handed to the producer.
    async fn initialize(&mut self, mut input: RunAgentInput) -> RunScope {
        let scope = RunScope::new(self.agent.info(), Arc::new(input.clone()));
        let mutation = self.run_chain(&Hook::RunInitialized, &scope).await;
        if mutation.messages.is_none() && mutation.state.is_none() {
            return scope;
        }
        if let Some(messages) = &mutation.messages {
            input.messages = messages.clone();
        }
        if let Some(state) = &mutation.state {
            input.state = state.clone();
        }
        let scope = RunScope::new(self.agent.info(), Arc::new(input));
        self.commit(mutation, &scope).await;
        scope
    }

    async fn stream(&mut self, scope: &RunScope, cancel: &CancellationToken) -> Result<(), AgentError> {
        self.enter(RunPhase::Streaming);
        let raw: EventStream = self.agent.producer.run((*scope.input).clone());
        let mut events = self.agent.pipeline.apply(raw);
        let mut reducer = self.agent.producer.reducer();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(run_id = %self.run_id, "run aborted");
                    return Err(AgentError::Aborted);
                }
                item = events.next() => item,
            };
            let Some(item) = next else {
                return Ok(());
            };
            let event = item?;
            self.apply_event(&event, reducer.as_mut(), scope).await?;
            self.enter(RunPhase::Streaming);

            if let Event::RunError(e) = &event {
                return Err(AgentError::Run {
                    message: e.message.clone(),
                    code: e.code.clone(),
                });
            }
        }
    }

    async fn apply_event(
        &mut self,
        event: &Event,
        reducer: &mut dyn Reducer,
        scope: &RunScope,
    ) -> Result<(), AgentError> {
        self.enter(RunPhase::Applying);
        let (messages, state) = self.snapshot().await;
        let Reduction { mutation, detail } = reducer.reduce(&messages, &state, event)?;

        let mut view_messages = messages;
        let mut view_state = state;
        if let Some(mutation) = mutation {
            fold(&mut view_messages, &mut view_state, mutation);
        }

        let general = run_subscribers_with_mutation(
            &self.subscribers,
            &view_messages,
            &view_state,
            &Hook::Event { event, detail: &detail },
            scope,
        )
        .await;
        let stopped = general.stop_propagation;
        fold(&mut view_messages, &mut view_state, general);

        if !stopped {
            let variant = run_subscribers_with_mutation(
                &self.subscribers,
                &view_messages,
                &view_state,
                &Hook::EventVariant { event, detail: &detail },
                scope,
            )
            .await;
            fold(&mut view_messages, &mut view_state, variant);
        }

        // Announce only what survived the subscriber chain.
        let new_message = detail
            .new_message
            .as_ref()
            .and_then(|m| view_messages.iter().find(|v| v.id == m.id))
            .cloned();
        let new_tool_call = detail
            .new_tool_call
            .as_ref()
            .and_then(|c| {
                view_messages
                    .iter()
                    .flat_map(|m| m.tool_calls.iter())
                    .find(|t| t.id == c.id)
            })
            .cloned();

        self.commit_view(view_messages, view_state, scope).await;

        if let Some(message) = &new_message {
            self.notify(Notification::NewMessage(message), scope).await;
        }
        if let Some(call) = &new_tool_call {
            self.notify(Notification::NewToolCall(call), scope).await;
        }
        Ok(())
    }

    /// Run the failure chain. `Ok` means a subscriber swallowed the error.
    async fn fail(&mut self, error: AgentError, scope: &RunScope) -> Result<(), AgentError> {
        self.enter(RunPhase::Erroring);
        let mutation = self.run_chain(&Hook::RunFailed(&error), scope).await;
        let swallowed = mutation.stop_propagation;
        self.commit(mutation, scope).await;

        if swallowed {
            tracing::warn!(run_id = %self.run_id, error = %error, "run error swallowed by subscriber");
            Ok(())
        } else {
            tracing::error!(
                run_id = %self.run_id,
                category = %error.category(),
                error = %error,
                "agent execution failed"
            );
            Err(error)
        }
    }

    async fn run_chain(&self, hook: &Hook<'_>, scope: &RunScope) -> StateMutation {
        let (messages, state) = self.snapshot().await;
        run_subscribers_with_mutation(&self.subscribers, &messages, &state, hook, scope).await
    }

    async fn snapshot(&self) -> (Vec<Message>, State) {
        (self.agent.messages().await, self.agent.state().await)
    }

    /// Commit the fields present in `mutation`.
    async fn commit(&mut self, mutation: StateMutation, scope: &RunScope) {
        let (mut messages, mut state) = self.snapshot().await;
        fold(&mut messages, &mut state, mutation);
        self.commit_view(messages, state, scope).await;
    }

    /// Replace canonical data that differs from `messages`/`state`, then notify.
    async fn commit_view(&mut self, messages: Vec<Message>, state: State, scope: &RunScope) {
        self.enter(RunPhase::Committing);
        let messages_changed = {
            let mut canonical = self.agent.messages.lock().await;
            if *canonical != messages {
                *canonical = messages;
                true
            } else {
                false
            }
        };
        let state_changed = {
            let mut canonical = self.agent.state.lock().await;
            if *canonical != state {
                *canonical = state;
                true
            } else {
                false
            }
        };

        if messages_changed {
            self.notify(Notification::MessagesChanged, scope).await;
        }
        if state_changed {
            self.notify(Notification::StateChanged, scope).await;
        }
    }

    async fn notify(&self, notification: Notification<'_>, scope: &RunScope) {
        let (messages, state) = self.snapshot().await;
        notify_subscribers(&self.subscribers, &messages, &state, notification, scope).await;
    }
}

fn fold(messages: &mut Vec<Message>, state: &mut State, mutation: StateMutation) {
    if let Some(next) = mutation.messages {
        *messages = next;
    }
    if let Some(next) = mutation.state {
        *state = next;
    }
}
