use regex::Regex;
use serde_json::Value;

use crate::json_path;
use crate::models::{PollCondition, ResponseResult};

/// Evaluate a poll condition against a response.
///
/// Returns whether every present sub-condition holds, plus one reason per
/// unsatisfied sub-condition. An empty condition is always satisfied.
/// Reasons never embed response header values.
pub fn evaluate(condition: &PollCondition, response: &ResponseResult) -> (bool, Vec<String>) {
    if condition.is_empty() {
        return (true, Vec::new());
    }

    let mut unsatisfied = Vec::new();

    if !condition.status_codes.is_empty()
        && !condition.status_codes.contains(&response.status_code)
    {
        unsatisfied.push(format!(
            "status code {} not in required codes {:?}",
            response.status_code, condition.status_codes
        ));
    }

    if !condition.json_path_equals.is_empty() {
        match serde_json::from_str::<Value>(&response.body) {
            Ok(body) => {
                for (path, expected) in &condition.json_path_equals {
                    match json_path::evaluate(&body, path) {
                        Ok(actual) => {
                            if !json_path::literal_matches(&actual, expected) {
                                unsatisfied.push(format!(
                                    "json path '{path}' does not equal expected '{expected}'"
                                ));
                            }
                        }
                        Err(err) => {
                            unsatisfied.push(format!("json path '{path}': {err}"));
                        }
                    }
                }
            }
            Err(_) => {
                unsatisfied.push("response body is not valid JSON".to_string());
            }
        }
    }

    for (name, expected) in &condition.header_equals {
        let matched = response.header(name).is_some_and(|v| v == expected);
        if !matched {
            unsatisfied.push(format!("header '{name}' condition not satisfied"));
        }
    }

    if let Some(pattern) = &condition.body_regex {
        match Regex::new(pattern) {
            Ok(regex) => {
                if !regex.is_match(&response.body) {
                    unsatisfied.push(format!("body does not match regex '{pattern}'"));
                }
            }
            Err(err) => {
                unsatisfied.push(format!("invalid body regex: {err}"));
            }
        }
    }

    let satisfied = unsatisfied.is_empty();
    log::debug!(
        "poll condition evaluated: satisfied={satisfied} status={} unsatisfied={unsatisfied:?}",
        response.status_code
    );

    (satisfied, unsatisfied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(status: u16, body: &str) -> ResponseResult {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("x-state".to_string(), "ready".to_string());
        ResponseResult {
            status_code: status,
            headers,
            body: body.to_string(),
            attempt_count: 1,
            error: None,
        }
    }

    #[test]
    fn test_empty_condition_is_satisfied() {
        let (satisfied, reasons) = evaluate(&PollCondition::default(), &response(500, ""));
        assert!(satisfied);
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_status_code_membership() {
        let condition = PollCondition {
            status_codes: vec![200, 201],
            ..Default::default()
        };
        assert!(evaluate(&condition, &response(201, "")).0);

        let (satisfied, reasons) = evaluate(&condition, &response(404, ""));
        assert!(!satisfied);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("404"));
    }

    #[test]
    fn test_json_path_equals_boolean() {
        let mut json_path_equals = HashMap::new();
        json_path_equals.insert("data.ready".to_string(), "true".to_string());
        let condition = PollCondition {
            json_path_equals,
            ..Default::default()
        };

        assert!(evaluate(&condition, &response(200, r#"{"data":{"ready":true}}"#)).0);
        assert!(!evaluate(&condition, &response(200, r#"{"data":{"ready":false}}"#)).0);
    }

    #[test]
    fn test_json_path_on_invalid_body() {
        let mut json_path_equals = HashMap::new();
        json_path_equals.insert("a".to_string(), "1".to_string());
        let condition = PollCondition {
            json_path_equals,
            ..Default::default()
        };

        let (satisfied, reasons) = evaluate(&condition, &response(200, "not json"));
        assert!(!satisfied);
        assert_eq!(reasons, vec!["response body is not valid JSON".to_string()]);
    }

    #[test]
    fn test_header_equals_case_insensitive_name() {
        let mut header_equals = HashMap::new();
        header_equals.insert("X-State".to_string(), "ready".to_string());
        let condition = PollCondition {
            header_equals,
            ..Default::default()
        };
        assert!(evaluate(&condition, &response(200, "")).0);

        let mut header_equals = HashMap::new();
        header_equals.insert("X-State".to_string(), "pending".to_string());
        let condition = PollCondition {
            header_equals,
            ..Default::default()
        };
        let (satisfied, reasons) = evaluate(&condition, &response(200, ""));
        assert!(!satisfied);
        assert!(reasons[0].contains("X-State"));
        assert!(!reasons[0].contains("ready"));
    }

    #[test]
    fn test_body_regex() {
        let condition = PollCondition {
            body_regex: Some("status.: .done".to_string()),
            ..Default::default()
        };
        assert!(evaluate(&condition, &response(200, r#"{"status": "done"}"#)).0);
        assert!(!evaluate(&condition, &response(200, r#"{"status": "busy"}"#)).0);
    }

    #[test]
    fn test_empty_regex_matches_anything() {
        let condition = PollCondition {
            body_regex: Some(String::new()),
            ..Default::default()
        };
        assert!(evaluate(&condition, &response(200, "whatever")).0);
    }

    #[test]
    fn test_all_sub_conditions_must_hold() {
        let mut header_equals = HashMap::new();
        header_equals.insert("x-state".to_string(), "ready".to_string());
        let condition = PollCondition {
            status_codes: vec![202],
            header_equals,
            ..Default::default()
        };
        let (satisfied, reasons) = evaluate(&condition, &response(200, ""));
        assert!(!satisfied);
        assert_eq!(reasons.len(), 1);
    }
}
