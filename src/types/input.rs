//! Per-run input and result types.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;
use super::State;

/// Immutable descriptor handed to the producer at run start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub context: Vec<Context>,
    #[serde(default)]
    pub forwarded_props: Value,
}

impl RunAgentInput {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            state: Value::Object(Default::default()),
            messages: Vec::new(),
            tools: Vec::new(),
            context: Vec::new(),
            forwarded_props: Value::Object(Default::default()),
        }
    }
}

/// Caller-supplied tool definition forwarded to the producer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool parameters.
    #[serde(default)]
    pub parameters: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Value::Object(Default::default()),
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Caller-supplied context entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    pub description: String,
    pub value: String,
}

/// Per-call options for [`Agent::run_agent`](crate::agent::Agent::run_agent).
///
/// ```
/// use cadence::types::{RunAgentParameters, Tool};
///
/// let params = RunAgentParameters::builder()
///     .run_id("run-1".to_string())
///     .tools(vec![Tool::new("search", "Search the web")])
///     .build();
/// assert_eq!(params.run_id.as_deref(), Some("run-1"));
/// ```
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentParameters {
    pub run_id: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[builder(default)]
    #[serde(default)]
    pub context: Vec<Context>,
    pub forwarded_props: Option<Value>,
}

/// Outcome of a successful (or swallowed) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentResult {
    /// Value carried by the terminal `RUN_FINISHED` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Messages committed during the run that were not in the run input.
    #[serde(default)]
    pub new_messages: Vec<Message>,
}
