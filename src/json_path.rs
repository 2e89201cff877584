use serde_json::Value;
use thiserror::Error;

/// Errors from evaluating a dot-path against a JSON document.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("key '{key}' not found at path '{at}'")]
    KeyNotFound { key: String, at: String },

    #[error("cannot access key '{key}' on non-object at path '{at}'")]
    NotAnObject { key: String, at: String },

    #[error("array index {index} out of bounds (length {len}) at path '{at}'")]
    IndexOutOfBounds { index: usize, len: usize, at: String },

    #[error("cannot access index {index} on non-array at path '{at}'")]
    NotAnArray { index: usize, at: String },

    #[error("invalid array index '{0}'")]
    InvalidIndex(String),
}

/// A parsed part of a dot-path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPart {
    Property(String),
    Index(usize),
}

/// Parse a dot-separated path with optional bracket indices: `key`,
/// `key[2]`, `[0].name`, `a.b[1].c`.
fn parse_json_path(path: &str) -> Result<Vec<PathPart>, PathError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    parts.push(PathPart::Property(current.clone()));
                    current.clear();
                }
            }
            '[' => {
                if !current.is_empty() {
                    parts.push(PathPart::Property(current.clone()));
                    current.clear();
                }

                let mut index_str = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == ']' {
                        closed = true;
                        break;
                    }
                    index_str.push(ch);
                }

                if !closed {
                    return Err(PathError::InvalidIndex(index_str));
                }
                let index: usize = index_str
                    .parse()
                    .map_err(|_| PathError::InvalidIndex(index_str.clone()))?;
                parts.push(PathPart::Index(index));
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(PathPart::Property(current));
    }

    Ok(parts)
}

/// Walk `path` through `value` and return the value found there. An empty
/// path returns the root.
pub fn evaluate(value: &Value, path: &str) -> Result<Value, PathError> {
    let parts = parse_json_path(path)?;
    let mut current = value;
    let mut walked = String::new();

    for part in &parts {
        match part {
            PathPart::Property(key) => {
                if !walked.is_empty() {
                    walked.push('.');
                }
                walked.push_str(key);
                match current {
                    Value::Object(obj) => {
                        current = obj.get(key).ok_or_else(|| PathError::KeyNotFound {
                            key: key.clone(),
                            at: walked.clone(),
                        })?;
                    }
                    _ => {
                        return Err(PathError::NotAnObject {
                            key: key.clone(),
                            at: walked.clone(),
                        })
                    }
                }
            }
            PathPart::Index(index) => {
                walked.push_str(&format!("[{index}]"));
                match current {
                    Value::Array(arr) => {
                        current = arr.get(*index).ok_or_else(|| PathError::IndexOutOfBounds {
                            index: *index,
                            len: arr.len(),
                            at: walked.clone(),
                        })?;
                    }
                    _ => {
                        return Err(PathError::NotAnArray {
                            index: *index,
                            at: walked.clone(),
                        })
                    }
                }
            }
        }
    }

    Ok(current.clone())
}

/// Canonical string form of a JSON value for extraction and comparison:
/// strings unquoted, booleans `true`/`false`, numbers in shortest
/// round-trip decimal form, null empty, containers compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                // f64 Display is shortest round-trip and drops a bare `.0`.
                n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
            }
        }
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Compare an actual JSON value against an expected literal. If the
/// literal parses as JSON the two are compared structurally; otherwise the
/// actual value's canonical string form is compared to the literal.
pub fn literal_matches(actual: &Value, expected: &str) -> bool {
    match serde_json::from_str::<Value>(expected) {
        Ok(parsed) => *actual == parsed,
        Err(_) => stringify(actual) == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "id": 123,
            "name": "test",
            "data": { "ready": true, "ratio": 1.5 },
            "items": [ { "id": 1 }, { "id": 2 } ]
        })
    }

    #[test]
    fn test_evaluate_nested_property() {
        assert_eq!(evaluate(&doc(), "data.ready").unwrap(), json!(true));
    }

    #[test]
    fn test_evaluate_array_index() {
        assert_eq!(evaluate(&doc(), "items[1].id").unwrap(), json!(2));
    }

    #[test]
    fn test_evaluate_leading_index_on_root_array() {
        let root = json!([ "a", "b" ]);
        assert_eq!(evaluate(&root, "[1]").unwrap(), json!("b"));
    }

    #[test]
    fn test_evaluate_empty_path_returns_root() {
        assert_eq!(evaluate(&doc(), "").unwrap(), doc());
    }

    #[test]
    fn test_evaluate_missing_key() {
        let err = evaluate(&doc(), "data.missing").unwrap_err();
        assert_eq!(
            err,
            PathError::KeyNotFound {
                key: "missing".to_string(),
                at: "data.missing".to_string()
            }
        );
    }

    #[test]
    fn test_evaluate_index_out_of_bounds() {
        let err = evaluate(&doc(), "items[5]").unwrap_err();
        assert!(matches!(err, PathError::IndexOutOfBounds { index: 5, len: 2, .. }));
    }

    #[test]
    fn test_evaluate_type_mismatch() {
        assert!(matches!(
            evaluate(&doc(), "name.inner").unwrap_err(),
            PathError::NotAnObject { .. }
        ));
        assert!(matches!(
            evaluate(&doc(), "name[0]").unwrap_err(),
            PathError::NotAnArray { .. }
        ));
    }

    #[test]
    fn test_evaluate_invalid_index() {
        assert!(matches!(
            evaluate(&doc(), "items[x]").unwrap_err(),
            PathError::InvalidIndex(_)
        ));
        assert!(matches!(
            evaluate(&doc(), "items[0").unwrap_err(),
            PathError::InvalidIndex(_)
        ));
    }

    #[test]
    fn test_stringify_scalars() {
        assert_eq!(stringify(&json!("v")), "v");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(null)), "");
    }

    #[test]
    fn test_stringify_numbers_shortest_round_trip() {
        assert_eq!(stringify(&json!(3.0)), "3");
        assert_eq!(stringify(&json!(1.5)), "1.5");
        assert_eq!(stringify(&json!(-7)), "-7");
    }

    #[test]
    fn test_stringify_containers_compact() {
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(stringify(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_literal_matches_parsed_json_structurally() {
        assert!(literal_matches(&json!(true), "true"));
        assert!(literal_matches(&json!(42), "42"));
        // A JSON string "true" is not the boolean true.
        assert!(!literal_matches(&json!("true"), "true"));
    }

    #[test]
    fn test_literal_matches_string_fallback() {
        assert!(literal_matches(&json!("in-progress"), "in-progress"));
        assert!(!literal_matches(&json!("done"), "in-progress"));
    }
}
