//! Tolerant parsing of raw completion text into JSON objects
//!
//! Completions arrive fenced or bare, as one object, several concatenated
//! objects, an array, or truncated mid-value. Parsing never fails: the worst
//! case is an empty list, and the caller keeps the raw text.

use serde_json::{Map, Value};

/// How a completion was parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMethod {
    /// Top-level JSON array
    Array,
    /// One or more balanced `{...}` segments
    Segments,
    /// Parsed only after structural repair
    Repaired,
    /// Nothing usable
    Failed,
}

/// Objects extracted from one completion
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCompletion {
    /// Parsed objects, empty ones dropped
    pub objects: Vec<Map<String, Value>>,
    /// Path that produced them
    pub method: ParseMethod,
}

/// Parse a completion into zero or more JSON objects
///
/// # Examples
///
/// ```
/// use quarry_extractor::parse_completion;
///
/// let objects = parse_completion("```json\n{\"a\": 1}{\"a\": 2}\n```");
/// assert_eq!(objects.len(), 2);
/// ```
pub fn parse_completion(text: &str) -> Vec<Map<String, Value>> {
    parse_completion_detailed(text).objects
}

/// Parse a completion, reporting which path succeeded
pub fn parse_completion_detailed(text: &str) -> ParsedCompletion {
    let body = strip_fence(text);

    let objects = parse_structured(body);
    if !objects.is_empty() {
        let method = if body.trim_start().starts_with('[') && parse_array(body).is_some() {
            ParseMethod::Array
        } else {
            ParseMethod::Segments
        };
        return ParsedCompletion { objects, method };
    }

    if let Some(repaired) = repair(body) {
        let objects = parse_structured(&repaired);
        if !objects.is_empty() {
            tracing::debug!(objects = objects.len(), "Completion parsed after repair");
            return ParsedCompletion {
                objects,
                method: ParseMethod::Repaired,
            };
        }
    }

    ParsedCompletion {
        objects: Vec::new(),
        method: ParseMethod::Failed,
    }
}

/// Array first, then balanced object segments
fn parse_structured(body: &str) -> Vec<Map<String, Value>> {
    if body.trim_start().starts_with('[') {
        if let Some(objects) = parse_array(body) {
            return objects;
        }
    }
    split_objects(body)
        .into_iter()
        .filter_map(|segment| match serde_json::from_str::<Value>(segment) {
            Ok(Value::Object(map)) if !map.is_empty() => Some(map),
            _ => None,
        })
        .collect()
}

fn parse_array(body: &str) -> Option<Vec<Map<String, Value>>> {
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) if !map.is_empty() => Some(map),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Remove an enclosing code fence; the closing fence is optional
///
/// Only a fence at the start of a line counts. JSON strings cannot hold a raw
/// newline, so backticks inside a string value are never taken for a fence.
pub fn strip_fence(text: &str) -> &str {
    let Some(open) = line_fences(text).next() else {
        return text.trim();
    };

    let after_open = &text[open + 3..];
    // Skip the language tag line (```json, ```JSON, or bare ```)
    let body = match after_open.find('\n') {
        Some(nl) if after_open[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &after_open[nl + 1..],
        _ => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = match line_fences(body).last() {
        Some(close) => &body[..close],
        None => body.trim_end().strip_suffix("```").unwrap_or(body),
    };
    body.trim()
}

/// Offsets of every ``` that starts a line (leading blanks allowed)
fn line_fences(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices("```").map(|(idx, _)| idx).filter(move |&idx| {
        text[..idx]
            .trim_end_matches([' ', '\t'])
            .chars()
            .last()
            .is_none_or(|c| c == '\n')
    })
}

/// Split text into maximal balanced `{...}` segments
///
/// Braces inside string literals (including escaped quotes) are ignored.
pub fn split_objects(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        segments.push(&text[s..=idx]);
                    }
                }
            }
            _ => {}
        }
    }

    segments
}

/// Complete the structure of truncated JSON
///
/// Drops trailing commas before closers, closes an open string, drops a
/// dangling comma, colon, partial literal or value-less key, then appends
/// closers for every unmatched `{`/`[`. Never adds field values.
pub fn repair(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let body = &text[start..];

    let mut out = String::with_capacity(body.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in body.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' | '[' => {
                stack.push(ch);
                out.push(ch);
            }
            '}' | ']' => {
                let open = if ch == '}' { '{' } else { '[' };
                if stack.last() == Some(&open) {
                    drop_trailing_comma(&mut out);
                    stack.pop();
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    loop {
        let len = out.trim_end().len();
        out.truncate(len);

        if out.ends_with(',') || out.ends_with('.') || out.ends_with('-') || out.ends_with('+') {
            out.pop();
        } else if out.ends_with(':') {
            out.pop();
            remove_trailing_string(&mut out);
        } else if stack.last() == Some(&'{') && ends_with_key(&out) {
            remove_trailing_string(&mut out);
        } else if !strip_partial_literal(&mut out) {
            break;
        }
    }

    for open in stack.iter().rev() {
        out.push(if *open == '{' { '}' } else { ']' });
    }

    Some(out)
}

fn drop_trailing_comma(out: &mut String) {
    let len = out.trim_end().len();
    out.truncate(len);
    if out.ends_with(',') {
        out.pop();
    }
}

/// Byte index of the opening quote of the string literal ending `out`
fn trailing_string_start(out: &str) -> Option<usize> {
    let bytes = out.as_bytes();
    if bytes.len() < 2 || bytes[bytes.len() - 1] != b'"' {
        return None;
    }
    let mut i = bytes.len() - 1;
    while i > 0 {
        i -= 1;
        if bytes[i] == b'"' {
            let backslashes = bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count();
            if backslashes % 2 == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn remove_trailing_string(out: &mut String) {
    if let Some(start) = trailing_string_start(out) {
        out.truncate(start);
    }
}

/// Whether `out` ends with an object key that has no colon yet
fn ends_with_key(out: &str) -> bool {
    let Some(start) = trailing_string_start(out) else {
        return false;
    };
    matches!(out[..start].trim_end().chars().last(), Some('{') | Some(','))
}

/// Drop a truncated `true`/`false`/`null` (or exponent marker)
fn strip_partial_literal(out: &mut String) -> bool {
    let run = out
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    if run == 0 {
        return false;
    }
    let tail = &out[out.len() - run..];
    if matches!(tail, "true" | "false" | "null") {
        return false;
    }
    let keep = out.len() - run;
    out.truncate(keep);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_object() {
        let objects = parse_completion(r#"{"title": "Finding", "severity": "high"}"#);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["severity"], json!("high"));
    }

    #[test]
    fn test_fenced_with_language_tag() {
        let text = "```json\n[{\"a\": 1}, {\"a\": 2}]\n```";
        let parsed = parse_completion_detailed(text);
        assert_eq!(parsed.objects.len(), 2);
        assert_eq!(parsed.method, ParseMethod::Array);
    }

    #[test]
    fn test_fence_without_closing() {
        let text = "```\n{\"a\": 1}";
        assert_eq!(parse_completion(text).len(), 1);
    }

    #[test]
    fn test_preamble_before_fence() {
        let text = "Here is the result:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(strip_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn test_backticks_inside_string_value() {
        let text = r#"{"finding": "see block ``` in annex", "severity": "high"}"#;
        assert_eq!(strip_fence(text), text);

        let objects = parse_completion(text);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["finding"], json!("see block ``` in annex"));
    }

    #[test]
    fn test_fenced_object_with_backticks_inside() {
        let text = "```json\n{\"finding\": \"use ```code``` here\"}\n```";
        let objects = parse_completion(text);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["finding"], json!("use ```code``` here"));
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(strip_fence("```json{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_three_element_array() {
        let text = r#"[{"n": 1}, {"n": 2}, {"n": 3}]"#;
        assert_eq!(parse_completion(text).len(), 3);
    }

    #[test]
    fn test_array_keeps_only_objects() {
        let text = r#"[{"n": 1}, 2, "x", {}, {"n": 3}]"#;
        assert_eq!(parse_completion(text).len(), 2);
    }

    #[test]
    fn test_concatenated_objects() {
        let text = "{\"a\": 1}\n{\"a\": \"brace } in string\"}{\"a\": {\"nested\": true}}";
        let parsed = parse_completion_detailed(text);
        assert_eq!(parsed.objects.len(), 3);
        assert_eq!(parsed.method, ParseMethod::Segments);
        assert_eq!(parsed.objects[1]["a"], json!("brace } in string"));
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let text = r#"{"a": "say \"}\" now"}{"b": 2}"#;
        assert_eq!(parse_completion(text).len(), 2);
    }

    #[test]
    fn test_truncated_array_keeps_complete_objects() {
        let text = r#"[{"n": 1}, {"n": 2}, {"n": "#;
        let objects = parse_completion(text);
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn test_truncated_nested_list_repaired_without_fabrication() {
        let parsed = parse_completion_detailed(r#"{"a":1,"b":[1,2,"#);
        assert_eq!(parsed.method, ParseMethod::Repaired);
        assert_eq!(parsed.objects.len(), 1);

        let record = &parsed.objects[0];
        assert_eq!(record["a"], json!(1));
        if let Some(b) = record.get("b") {
            let items = b.as_array().unwrap();
            assert!(items.len() <= 2);
            for (i, item) in items.iter().enumerate() {
                assert_eq!(item, &json!(i + 1));
            }
        }
    }

    #[test]
    fn test_repair_drops_dangling_key() {
        assert_eq!(repair(r#"{"a": 1, "b": "#).unwrap(), r#"{"a": 1}"#);
        assert_eq!(repair(r#"{"a": 1, "b"#).unwrap(), r#"{"a": 1}"#);
        assert_eq!(repair(r#"{"a": 1, "b": tru"#).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_repair_closes_open_string_value() {
        assert_eq!(repair(r#"{"title": "Audit of fin"#).unwrap(), r#"{"title": "Audit of fin"}"#);
    }

    #[test]
    fn test_repair_trailing_comma_before_closer() {
        let parsed = parse_completion_detailed(r#"{"a": [1, 2,], "b": 3,}"#);
        assert_eq!(parsed.method, ParseMethod::Repaired);
        assert_eq!(parsed.objects[0]["a"], json!([1, 2]));
        assert_eq!(parsed.objects[0]["b"], json!(3));
    }

    #[test]
    fn test_unparseable_yields_empty() {
        let parsed = parse_completion_detailed("No findings were identified in this document.");
        assert!(parsed.objects.is_empty());
        assert_eq!(parsed.method, ParseMethod::Failed);
        assert!(parse_completion("").is_empty());
        assert!(parse_completion("{}").is_empty());
    }
}
