//! Cadence: agent run pipeline
//!
//! Streams the typed events a producer emits for one run, validates and
//! de-chunks them, reduces them into transcript/state mutations, and threads
//! every mutation through an ordered chain of subscribers before committing
//! it to the agent's canonical state. Finalization hooks fire exactly once
//! per run, whether it succeeds, fails, or is aborted.
//!
//! # Quick Start
//!
//! ```
//! use cadence::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> cadence::error::Result<()> {
//! let producer = ReplayProducer::new(vec![
//!     Event::run_started("t", "r"),
//!     Event::state_delta(vec![
//!         json!({"op": "add", "path": "/count", "value": 1}),
//!         json!({"op": "increment", "path": "/count"}),
//!     ]),
//!     Event::run_finished("t", "r", None),
//! ]);
//! let agent = Agent::new(producer, AgentConfig::default());
//! agent.run_agent(RunAgentParameters::default(), None).await?;
//! assert_eq!(agent.state().await, json!({"count": 2}));
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod apply;
pub mod config;
pub mod error;
pub mod events;
pub mod prelude;
pub mod stream_transform;
pub mod subscriber;
pub mod types;
pub mod util;

#[cfg(feature = "legacy")]
pub mod legacy;

#[cfg(feature = "cli")]
pub mod cli;
