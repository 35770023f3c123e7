//! Agent run controller: canonical state, subscribers, and run execution.

pub mod agent;
mod capture;
pub mod controller;
pub mod producer;

pub use agent::{Agent, Subscription};
pub use controller::RunPhase;
pub use producer::{EventProducer, ReplayProducer};
