//! Best-effort parsing of truncated JSON text.
//!
//! Tool-call arguments arrive as JSON fragments. Between fragments the
//! accumulated text is usually not valid JSON; [`parse_partial`] closes any
//! open strings, arrays and objects and backs off to the last complete
//! member when a trailing token is cut short.

use serde_json::Value;

/// Parse as much of `input` as forms a valid JSON value.
///
/// ```
/// use cadence::util::partial_json::parse_partial;
/// use serde_json::json;
///
/// assert_eq!(parse_partial(r#"{"city": "Par"#), Some(json!({"city": "Par"})));
/// assert_eq!(parse_partial(r#"{"a": [1, 2"#), Some(json!({"a": [1, 2]})));
/// ```
pub fn parse_partial(input: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(input) {
        return Some(value);
    }

    let boundaries = scan(input).boundaries;
    let mut end = input.len();
    loop {
        if let Some(value) = complete(&input[..end]) {
            return Some(value);
        }
        end = boundaries.iter().rev().copied().find(|b| *b < end)?;
    }
}

struct Scan {
    stack: Vec<char>,
    in_string: bool,
    escaped: bool,
    /// Byte offsets where the text can be cut and still end on a member boundary.
    boundaries: Vec<usize>,
}

fn scan(text: &str) -> Scan {
    let mut out = Scan {
        stack: Vec::new(),
        in_string: false,
        escaped: false,
        boundaries: Vec::new(),
    };
    for (idx, ch) in text.char_indices() {
        if out.in_string {
            if out.escaped {
                out.escaped = false;
            } else if ch == '\\' {
                out.escaped = true;
            } else if ch == '"' {
                out.in_string = false;
            }
            continue;
        }
        match ch {
            '"' => out.in_string = true,
            '{' | '[' => {
                out.stack.push(ch);
                out.boundaries.push(idx + 1);
            }
            '}' | ']' => {
                out.stack.pop();
            }
            ',' => out.boundaries.push(idx),
            _ => {}
        }
    }
    out
}

fn complete(text: &str) -> Option<Value> {
    let state = scan(text);
    let mut repaired = text.to_string();

    if state.in_string {
        if state.escaped {
            repaired.pop();
        }
        repaired.push('"');
    }

    let trimmed_len = repaired.trim_end().len();
    repaired.truncate(trimmed_len);
    if repaired.ends_with(',') {
        repaired.pop();
    } else if repaired.ends_with(':') {
        repaired.push_str("null");
    }

    for open in state.stack.iter().rev() {
        repaired.push(if *open == '{' { '}' } else { ']' });
    }
    serde_json::from_str(&repaired).ok()
}
