//! Extraction of structured output from model responses.
//!
//! Models frequently wrap JSON in prose or code fences. These helpers find
//! the first balanced top-level object that actually parses.

use serde_json::Value;

/// Return the first well-formed top-level JSON object embedded in `text`.
///
/// Braces inside string literals are ignored while matching. If a balanced
/// candidate fails to parse, scanning resumes at the next `{`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(bytes, start) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..=end])
            {
                return Some(value);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Index of the `}` closing the `{` at `start`, honoring string literals.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
