//! Lenient JSON extraction from model output.
//!
//! Models wrap JSON in commentary and code fences. Candidates are tried in
//! order: a ```json fence, any other ``` fence, then the outermost bracket
//! span. The first candidate that parses to the requested shape wins.

use serde_json::{Map, Value};

/// First JSON array found in `response`.
pub fn extract_json_array(response: &str) -> Option<Vec<Value>> {
    candidates(response, '[', ']')
        .into_iter()
        .find_map(|candidate| match serde_json::from_str(candidate) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        })
}

/// First JSON object found in `response`.
pub fn extract_json_object(response: &str) -> Option<Map<String, Value>> {
    candidates(response, '{', '}')
        .into_iter()
        .find_map(|candidate| match serde_json::from_str(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

fn candidates(response: &str, open: char, close: char) -> Vec<&str> {
    let trimmed = response.trim();
    let mut found = Vec::new();

    if let Some(start) = trimmed.find("```json") {
        let content_start = start + "```json".len();
        if let Some(end) = trimmed[content_start..].find("```") {
            found.push(trimmed[content_start..content_start + end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_start = start + 3;
        // Skip the language identifier line
        let content_start = trimmed[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);
        if let Some(end) = trimmed[content_start..].find("```") {
            found.push(trimmed[content_start..content_start + end].trim());
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
        if end > start {
            found.push(&trimmed[start..=end]);
        }
    }

    found
}
