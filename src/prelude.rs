//! Convenience re-exports for common use.

pub use crate::agent::{Agent, EventProducer, ReplayProducer, Subscription};
pub use crate::apply::{DefaultReducer, Reducer};
pub use crate::config::AgentConfig;
pub use crate::error::{AgentError, Result};
pub use crate::events::{Event, EventType};
pub use crate::stream_transform::{EventStream, EventTransform, TransformPipeline};
pub use crate::subscriber::{
    AgentSubscriber, HookResult, LoggingSubscriber, StateMutation, SubscriberParams,
};
pub use crate::types::{
    Message, Role, RunAgentInput, RunAgentParameters, RunAgentResult, State, ToolCall,
};
