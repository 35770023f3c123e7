//! State delta application.
//!
//! Deltas are ordered lists of JSON Patch (RFC 6902) operations plus one
//! numeric extension:
//!
//! ```json
//! { "op": "increment", "path": "/count", "value": 2 }
//! ```
//!
//! `value` defaults to 1. Incrementing a missing member creates it.

use json_patch::{Patch, PatchOperation};
use serde_json::{Number, Value};

use crate::error::AgentError;
use crate::types::State;

/// Apply `delta` to a copy of `state`, one operation at a time.
///
/// Later operations see the result of earlier ones. The input is never
/// modified; on failure no partial result escapes.
///
/// ```
/// use cadence::apply::apply_state_delta;
/// use serde_json::json;
///
/// let next = apply_state_delta(
///     &json!({}),
///     &[
///         json!({"op": "add", "path": "/count", "value": 1}),
///         json!({"op": "increment", "path": "/count"}),
///     ],
/// )
/// .unwrap();
/// assert_eq!(next, json!({"count": 2}));
/// ```
pub fn apply_state_delta(state: &State, delta: &[Value]) -> Result<State, AgentError> {
    let mut doc = state.clone();
    for (index, raw) in delta.iter().enumerate() {
        apply_op(&mut doc, raw)
            .map_err(|e| AgentError::InvalidState(format!("state delta op #{index}: {e}")))?;
    }
    Ok(doc)
}

fn apply_op(doc: &mut Value, raw: &Value) -> Result<(), String> {
    if raw.get("op").and_then(Value::as_str) == Some("increment") {
        return increment(doc, raw);
    }
    let op: PatchOperation =
        serde_json::from_value(raw.clone()).map_err(|e| format!("invalid operation: {e}"))?;
    json_patch::patch(doc, &Patch(vec![op])).map_err(|e| e.to_string())
}

fn increment(doc: &mut Value, raw: &Value) -> Result<(), String> {
    let path = raw
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| "increment requires a string path".to_string())?;
    let amount = match raw.get("value") {
        None | Some(Value::Null) => Number::from(1),
        Some(Value::Number(n)) => n.clone(),
        Some(other) => return Err(format!("increment amount must be a number, got {other}")),
    };

    match doc.pointer_mut(path) {
        Some(Value::Number(current)) => {
            *current = add_numbers(current, &amount)?;
            Ok(())
        }
        Some(other) => Err(format!("cannot increment non-numeric value {other} at {path}")),
        None => {
            let add = serde_json::json!({ "op": "add", "path": path, "value": amount });
            let op: PatchOperation = serde_json::from_value(add).map_err(|e| e.to_string())?;
            json_patch::patch(doc, &Patch(vec![op])).map_err(|e| e.to_string())
        }
    }
}

fn add_numbers(a: &Number, b: &Number) -> Result<Number, String> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum).ok_or_else(|| format!("increment produced a non-finite number: {sum}"))
}
