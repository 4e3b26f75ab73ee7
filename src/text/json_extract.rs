//! JSON payload recovery from free-form model replies.
//!
//! Models wrap valid JSON in code fences, prefix it with commentary, or
//! trail it with explanations. Recovery is two-tier: direct parse of the
//! fence-stripped text, then the substring from the first `{` to the last
//! `}`. Failure returns `None` — callers fall back to treating the reply as
//! plain prose, never to an error.

use serde_json::{Map, Value};

use super::normalize::strip_code_fences;

/// Recover a JSON object from a model reply. Never panics, never errors.
pub fn extract_json(text: &str) -> Option<Map<String, Value>> {
    let stripped = strip_code_fences(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&stripped) {
        return Some(map);
    }

    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&stripped[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
