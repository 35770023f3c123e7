//! Core data model: transcript messages, run input, state.

pub mod input;
pub mod message;

pub use input::*;
pub use message::*;

/// Opaque agent working memory. Only ever replaced wholesale or patched.
pub type State = serde_json::Value;
