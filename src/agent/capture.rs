//! Built-in subscriber that records the run result.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::events::Event;
use crate::subscriber::{AgentSubscriber, HookResult, SubscriberParams};

/// First subscriber of every run; keeps the `RUN_FINISHED` result.
#[derive(Debug, Default)]
pub(crate) struct ResultCapture {
    result: Mutex<Option<Value>>,
}

impl ResultCapture {
    pub(crate) fn take(&self) -> Option<Value> {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl AgentSubscriber for ResultCapture {
    fn name(&self) -> &str {
        "result_capture"
    }

    async fn on_event(&self, event: &Event, _params: SubscriberParams) -> HookResult {
        if let Event::RunFinished(e) = event {
            *self.result.lock().unwrap_or_else(PoisonError::into_inner) = e.result.clone();
        }
        Ok(None)
    }
}
