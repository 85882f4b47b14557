// Input coercion: free-text test input -> structured value, without a schema.
// The synthesized harnesses in wrapper.rs embed the same algorithm.

use regex::Regex;
use serde_json::{Number, Value};
use std::sync::OnceLock;

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s,]+").expect("valid separator regex"))
}

fn integer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").expect("valid integer regex"))
}

fn decimal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d*\.\d+$").expect("valid decimal regex"))
}

/// Text that looks like a JSON array or object
pub fn is_json_shaped(text: &str) -> bool {
    (text.starts_with('[') && text.ends_with(']')) || (text.starts_with('{') && text.ends_with('}'))
}

/// Convert a test-case input string into the most plausible value.
///
/// Never fails: blank input comes back untouched, JSON-shaped input is
/// parsed when it is valid JSON, otherwise the text is split on commas and
/// whitespace and each token coerced on its own. A single token is returned
/// as the trimmed string, not a one-element list.
pub fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(raw.to_string());
    }

    if is_json_shaped(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }

    let tokens: Vec<&str> = separators()
        .split(trimmed)
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.len() <= 1 {
        return Value::String(trimmed.to_string());
    }

    Value::Array(tokens.into_iter().map(coerce_token).collect())
}

fn coerce_token(token: &str) -> Value {
    if integer_pattern().is_match(token) {
        return match token.parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            // Out of i64 range: behave like a float parse
            Err(_) => float_value(token),
        };
    }

    if decimal_pattern().is_match(token) {
        return float_value(token);
    }

    if is_json_shaped(token) {
        if let Ok(value) = serde_json::from_str::<Value>(token) {
            return value;
        }
    }

    Value::String(token.to_string())
}

fn float_value(token: &str) -> Value {
    token
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(token.to_string()))
}

/// Short label for the shape of a coerced value, used in logs
pub fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_input_unchanged() {
        assert_eq!(coerce(""), json!(""));
        assert_eq!(coerce("   \n"), json!("   \n"));
    }

    #[test]
    fn test_json_array_and_object() {
        assert_eq!(coerce("[1, 2, 3]"), json!([1, 2, 3]));
        assert_eq!(coerce("  {\"a\": [1, \"x\"]}  "), json!({"a": [1, "x"]}));
        assert_eq!(coerce("[]"), json!([]));
    }

    #[test]
    fn test_json_wins_over_token_coercion() {
        // Strings inside valid JSON stay strings
        assert_eq!(coerce(r#"["1", "2.5"]"#), json!(["1", "2.5"]));
    }

    #[test]
    fn test_single_token_stays_a_string() {
        assert_eq!(coerce("5"), json!("5"));
        assert_eq!(coerce("  hello "), json!("hello"));
        assert_eq!(coerce("3.14"), json!("3.14"));
    }

    #[test]
    fn test_multiple_tokens_become_a_list() {
        assert_eq!(coerce("1 2 3"), json!([1, 2, 3]));
        assert_eq!(coerce("1, 2,3"), json!([1, 2, 3]));
        assert_eq!(coerce("-4\n2.5 .5"), json!([-4, 2.5, 0.5]));
        assert_eq!(coerce("abc 7"), json!(["abc", 7]));
    }

    #[test]
    fn test_bracketed_tokens() {
        assert_eq!(coerce("[1,2] 3"), json!([[1, 2], 3]));
        assert_eq!(coerce("{\"k\":1} x"), json!([{"k": 1}, "x"]));
        // Broken JSON token falls back to the raw token
        assert_eq!(coerce("[1 2]"), json!(["[1", "2]"]));
        assert_eq!(coerce("[x] y"), json!(["[x]", "y"]));
    }

    #[test]
    fn test_invalid_json_shaped_input_is_tokenized() {
        assert_eq!(coerce("[1, 2,"), json!(["[1", 2]));
    }

    #[test]
    fn test_only_separators() {
        assert_eq!(coerce(" , ,"), json!(", ,"));
    }

    #[test]
    fn test_huge_integer_becomes_float() {
        let value = coerce("99999999999999999999 1");
        assert!(value[0].is_f64());
        assert_eq!(value[1], json!(1));
    }

    #[test]
    fn test_shape_labels() {
        assert_eq!(shape_of(&coerce("1 2")), "list");
        assert_eq!(shape_of(&coerce("5")), "string");
        assert_eq!(shape_of(&coerce("{}")), "object");
    }
}
