//! Subscriber that traces run activity.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::events::Event;
use crate::types::{Message, ToolCall};

use super::{AgentSubscriber, HookResult, SubscriberParams};

/// Emits `tracing` records for lifecycle hooks and events. Never mutates.
#[derive(Debug, Clone, Default)]
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentSubscriber for LoggingSubscriber {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_run_initialized(&self, params: SubscriberParams) -> HookResult {
        tracing::info!(
            agent_id = %params.agent.agent_id,
            thread_id = %params.input.thread_id,
            run_id = %params.input.run_id,
            messages = params.messages.len(),
            "run initialized"
        );
        Ok(None)
    }

    async fn on_run_failed(&self, error: &AgentError, params: SubscriberParams) -> HookResult {
        tracing::warn!(
            run_id = %params.input.run_id,
            category = %error.category(),
            error = %error,
            "run failed"
        );
        Ok(None)
    }

    async fn on_run_finalized(&self, params: SubscriberParams) -> HookResult {
        tracing::info!(
            run_id = %params.input.run_id,
            messages = params.messages.len(),
            "run finalized"
        );
        Ok(None)
    }

    async fn on_event(&self, event: &Event, params: SubscriberParams) -> HookResult {
        tracing::debug!(
            run_id = %params.input.run_id,
            event_type = %event.event_type(),
            "event"
        );
        Ok(None)
    }

    async fn on_new_message(&self, message: &Message, params: SubscriberParams) {
        tracing::debug!(
            run_id = %params.input.run_id,
            message_id = %message.id,
            role = ?message.role,
            "new message"
        );
    }

    async fn on_new_tool_call(&self, tool_call: &ToolCall, params: SubscriberParams) {
        tracing::debug!(
            run_id = %params.input.run_id,
            tool_call_id = %tool_call.id,
            tool = %tool_call.function.name,
            "new tool call"
        );
    }
}
