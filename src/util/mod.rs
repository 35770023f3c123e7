//! Utility modules.

pub mod partial_json;
