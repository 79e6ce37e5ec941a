//! Tolerant repair of truncated JSON
//!
//! Streaming cuts JSON mid-token. The repair pass turns the common
//! truncation artifacts into a candidate that strict parsing can accept:
//! unterminated strings, trailing commas, dangling keys or colons,
//! half-written literals and missing closing brackets. The result is only a
//! candidate; callers must still parse it strictly.

/// Attempt to turn truncated JSON text into well-formed JSON text
///
/// Returns `None` when the input is empty or structurally inconsistent
/// (e.g. a `]` closing a `{`). A `Some` result is not guaranteed to parse.
///
/// # Examples
///
/// ```
/// use docstream_extractor::repair_json;
///
/// assert_eq!(repair_json(r#"{"a": [1, 2,"#).as_deref(), Some(r#"{"a": [1, 2]}"#));
/// assert_eq!(repair_json(r#"{"note": "half"#).as_deref(), Some(r#"{"note": "half"}"#));
/// ```
pub fn repair_json(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(trimmed.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut string_is_key = false;
    let mut string_start = 0;
    // Byte span of the most recent object key, used to drop a dangling key
    let mut last_key: Option<(usize, usize)> = None;

    for c in trimmed.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                if string_is_key {
                    last_key = Some((string_start, out.len()));
                }
            }
            continue;
        }

        match c {
            '"' => {
                string_is_key = stack.last() == Some(&'{')
                    && matches!(last_significant(&out), Some('{') | Some(','));
                string_start = out.len();
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                stack.push(c);
                out.push(c);
            }
            '}' | ']' => {
                strip_trailing_comma(&mut out);
                let expected = if c == '}' { '{' } else { '[' };
                if stack.pop() != Some(expected) {
                    return None;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        } else {
            drop_partial_unicode_escape(&mut out);
        }
        out.push('"');
        if string_is_key {
            last_key = Some((string_start, out.len()));
        }
    }

    // Peel incomplete trailing tokens until the tail is a complete value
    loop {
        let end = out.trim_end().len();
        out.truncate(end);

        if out.ends_with(',') {
            out.pop();
            continue;
        }
        if out.ends_with(':') {
            out.push_str("null");
            break;
        }
        if let Some((start, key_end)) = last_key {
            if key_end == out.len() {
                out.truncate(start);
                last_key = None;
                continue;
            }
        }
        let token_start = out
            .char_indices()
            .rev()
            .find(|(_, c)| !is_literal_char(*c))
            .map(|(idx, c)| idx + c.len_utf8())
            .unwrap_or(0);
        if token_start < out.len() && !is_complete_literal(&out[token_start..]) {
            out.truncate(token_start);
            continue;
        }
        break;
    }

    for open in stack.iter().rev() {
        strip_trailing_comma(&mut out);
        out.push(if *open == '{' { '}' } else { ']' });
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn last_significant(out: &str) -> Option<char> {
    out.trim_end().chars().last()
}

fn strip_trailing_comma(out: &mut String) {
    let end = out.trim_end().len();
    if out[..end].ends_with(',') {
        out.truncate(end - 1);
    }
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')
}

fn is_complete_literal(token: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(token),
        Ok(serde_json::Value::Bool(_))
            | Ok(serde_json::Value::Null)
            | Ok(serde_json::Value::Number(_))
    )
}

/// Remove a `\uXX` escape cut before its four hex digits
fn drop_partial_unicode_escape(out: &mut String) {
    let Some(idx) = out.rfind("\\u") else {
        return;
    };
    // An escaped backslash ("\\u") is literal text, not an escape
    let preceding = out[..idx].chars().rev().take_while(|c| *c == '\\').count();
    if preceding % 2 == 1 {
        return;
    }
    let digits = &out[idx + 2..];
    if digits.len() < 4 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        out.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn repaired(input: &str) -> Value {
        let candidate = repair_json(input).expect("repair produced nothing");
        serde_json::from_str(&candidate)
            .unwrap_or_else(|e| panic!("candidate {:?} did not parse: {}", candidate, e))
    }

    #[test]
    fn test_closes_missing_brackets() {
        assert_eq!(repaired(r#"{"a": 1, "b": [1,2"#), json!({"a": 1, "b": [1, 2]}));
        assert_eq!(repaired(r#"[{"x": {"y": true"#), json!([{"x": {"y": true}}]));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(repaired(r#"{"summary": "The contract sta"#), json!({"summary": "The contract sta"}));
    }

    #[test]
    fn test_dangling_backslash_in_string() {
        assert_eq!(repaired(r#"{"path": "C:\"#), json!({"path": "C:"}));
    }

    #[test]
    fn test_partial_unicode_escape() {
        assert_eq!(repaired(r#"{"s": "caf\u00"#), json!({"s": "caf"}));
        assert_eq!(repaired(r#"{"s": "caf\u00e9"#), json!({"s": "café"}));
    }

    #[test]
    fn test_trailing_commas() {
        assert_eq!(repaired(r#"{"a": [1, 2,], "b": 3,}"#), json!({"a": [1, 2], "b": 3}));
        assert_eq!(repaired(r#"{"a": [1, 2, "#), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_dangling_colon_becomes_null() {
        assert_eq!(repaired(r#"{"a": 1, "b":"#), json!({"a": 1, "b": null}));
    }

    #[test]
    fn test_dangling_key_is_dropped() {
        assert_eq!(repaired(r#"{"a": 1, "b""#), json!({"a": 1}));
        assert_eq!(repaired(r#"{"a": 1, "bo"#), json!({"a": 1}));
        assert_eq!(repaired(r#"{"on"#), json!({}));
    }

    #[test]
    fn test_partial_literals() {
        assert_eq!(repaired(r#"{"ok": tr"#), json!({"ok": null}));
        assert_eq!(repaired(r#"{"n": -"#), json!({"n": null}));
        assert_eq!(repaired(r#"{"n": 1."#), json!({"n": null}));
        assert_eq!(repaired(r#"[1, 2, 3"#), json!([1, 2, 3]));
        assert_eq!(repaired(r#"{"ok": false"#), json!({"ok": false}));
    }

    #[test]
    fn test_array_strings_are_not_keys() {
        assert_eq!(repaired(r#"{"tags": ["a", "b"#), json!({"tags": ["a", "b"]}));
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        assert_eq!(repaired(r#"{"t": "a } b ] c", "u": [1"#), json!({"t": "a } b ] c", "u": [1]}));
    }

    #[test]
    fn test_mismatched_brackets_rejected() {
        assert!(repair_json(r#"{"a": [1, 2}"#).is_none());
        assert!(repair_json("").is_none());
        assert!(repair_json("   ").is_none());
    }

    #[test]
    fn test_unrepairable_stays_invalid() {
        let candidate = repair_json(r#"{"a": 1 "b""#).unwrap();
        assert!(serde_json::from_str::<Value>(&candidate).is_err());
    }

    #[test]
    fn test_complete_json_is_unchanged() {
        let text = r#"{"a": {"b": [1, "two", null]}}"#;
        assert_eq!(repair_json(text).as_deref(), Some(text));
    }
}
