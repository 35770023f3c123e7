//! Sequential subscriber chain execution.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::types::{Message, State, ToolCall};

use super::{AgentSubscriber, Hook, RunScope, StateMutation};

/// Run `hook` on each subscriber in order, folding their mutations.
///
/// Each subscriber sees its own copy of the view produced by the ones before
/// it. A subscriber that returns an error or panics is logged and skipped.
/// The chain stops after the first mutation with `stop_propagation` set.
///
/// The returned mutation only carries fields that differ from the inputs,
/// plus the final stop flag.
pub async fn run_subscribers_with_mutation(
    subscribers: &[Arc<dyn AgentSubscriber>],
    messages: &[Message],
    state: &State,
    hook: &Hook<'_>,
    scope: &RunScope,
) -> StateMutation {
    let mut current_messages = messages.to_vec();
    let mut current_state = state.clone();
    let mut stop_propagation = false;

    for subscriber in subscribers {
        let params = scope.params(current_messages.clone(), current_state.clone());
        let outcome = AssertUnwindSafe(hook.invoke(subscriber.as_ref(), params))
            .catch_unwind()
            .await;

        let mutation = match outcome {
            Ok(Ok(Some(mutation))) => mutation,
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => {
                tracing::warn!(
                    subscriber = subscriber.name(),
                    hook = hook.name(),
                    error = %e,
                    "subscriber hook failed"
                );
                continue;
            }
            Err(payload) => {
                tracing::warn!(
                    subscriber = subscriber.name(),
                    hook = hook.name(),
                    panic = %panic_message(payload.as_ref()),
                    "subscriber hook panicked"
                );
                continue;
            }
        };

        if let Some(next) = mutation.messages {
            current_messages = next;
        }
        if let Some(next) = mutation.state {
            current_state = next;
        }
        if mutation.stop_propagation {
            tracing::debug!(
                subscriber = subscriber.name(),
                hook = hook.name(),
                "subscriber stopped propagation"
            );
            stop_propagation = true;
            break;
        }
    }

    StateMutation {
        messages: (current_messages.as_slice() != messages).then_some(current_messages),
        state: (current_state != *state).then_some(current_state),
        stop_propagation,
    }
}

/// Post-commit notification.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    MessagesChanged,
    StateChanged,
    NewMessage(&'a Message),
    NewToolCall(&'a ToolCall),
}

impl Notification<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::MessagesChanged => "on_messages_changed",
            Self::StateChanged => "on_state_changed",
            Self::NewMessage(_) => "on_new_message",
            Self::NewToolCall(_) => "on_new_tool_call",
        }
    }
}

/// Deliver `notification` to every subscriber in order. Panics are logged.
pub async fn notify_subscribers(
    subscribers: &[Arc<dyn AgentSubscriber>],
    messages: &[Message],
    state: &State,
    notification: Notification<'_>,
    scope: &RunScope,
) {
    for subscriber in subscribers {
        let params = scope.params(messages.to_vec(), state.clone());
        let call = async {
            match notification {
                Notification::MessagesChanged => subscriber.on_messages_changed(params).await,
                Notification::StateChanged => subscriber.on_state_changed(params).await,
                Notification::NewMessage(message) => subscriber.on_new_message(message, params).await,
                Notification::NewToolCall(call) => subscriber.on_new_tool_call(call, params).await,
            }
        };
        if let Err(payload) = AssertUnwindSafe(call).catch_unwind().await {
            tracing::warn!(
                subscriber = subscriber.name(),
                hook = notification.name(),
                panic = %panic_message(payload.as_ref()),
                "subscriber notification panicked"
            );
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
