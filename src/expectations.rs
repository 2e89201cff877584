use serde_json::Value;

use crate::error::{Error, Result};
use crate::json_path;
use crate::models::{Expectations, ResponseResult};

/// Validate a response against declared expectations.
///
/// All failures are accumulated and returned as a single
/// [`Error::ExpectationFailed`] so a run surfaces every violated assertion
/// at once.
pub fn validate(expect: &Expectations, response: &ResponseResult) -> Result<()> {
    let mut failures = Vec::new();

    if !expect.status_codes.is_empty() && !expect.status_codes.contains(&response.status_code) {
        failures.push(format!(
            "status code {} not in expected codes {:?}",
            response.status_code, expect.status_codes
        ));
    }

    for name in &expect.header_present {
        if response.header(name).is_none() {
            failures.push(format!("required header '{name}' not present"));
        }
    }

    if expect.wants_json() {
        match serde_json::from_str::<Value>(&response.body) {
            Ok(body) => {
                for path in &expect.json_path_exists {
                    if let Err(err) = json_path::evaluate(&body, path) {
                        failures.push(format!("expected json path '{path}' missing: {err}"));
                    }
                }

                for (path, expected) in &expect.json_path_equals {
                    match json_path::evaluate(&body, path) {
                        Ok(actual) => {
                            if !json_path::literal_matches(&actual, expected) {
                                failures.push(format!(
                                    "json path '{path}' does not equal expected '{expected}'"
                                ));
                            }
                        }
                        Err(err) => failures.push(format!("json path '{path}': {err}")),
                    }
                }
            }
            Err(_) => {
                failures.push(
                    "json path expectations requested but response body is not valid JSON"
                        .to_string(),
                );
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        log::debug!("{} expectation(s) failed: {failures:?}", failures.len());
        Err(Error::ExpectationFailed(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(status: u16, body: &str) -> ResponseResult {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        ResponseResult {
            status_code: status,
            headers,
            body: body.to_string(),
            attempt_count: 1,
            error: None,
        }
    }

    #[test]
    fn test_passes_when_all_expectations_hold() {
        let expect = Expectations {
            status_codes: vec![200],
            header_present: vec!["Content-Type".to_string()],
            ..Default::default()
        };
        assert!(validate(&expect, &response(200, "ok")).is_ok());
    }

    #[test]
    fn test_accumulates_all_failures() {
        let expect = Expectations {
            status_codes: vec![200],
            header_present: vec!["X-Id".to_string()],
            ..Default::default()
        };

        let err = validate(&expect, &response(500, "bad")).unwrap_err();
        match err {
            Error::ExpectationFailed(failures) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("500"));
                assert!(failures[1].contains("X-Id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_path_exists_and_equals() {
        let mut json_path_equals = HashMap::new();
        json_path_equals.insert("state".to_string(), "active".to_string());
        let expect = Expectations {
            json_path_exists: vec!["items[0].id".to_string()],
            json_path_equals,
            ..Default::default()
        };

        let body = r#"{"state": "active", "items": [{"id": 1}]}"#;
        assert!(validate(&expect, &response(200, body)).is_ok());

        let body = r#"{"state": "inactive", "items": []}"#;
        let err = validate(&expect, &response(200, body)).unwrap_err();
        match err {
            Error::ExpectationFailed(failures) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_checks_on_non_json_body() {
        let expect = Expectations {
            json_path_exists: vec!["id".to_string()],
            ..Default::default()
        };
        let err = validate(&expect, &response(200, "<html>")).unwrap_err();
        match err {
            Error::ExpectationFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("not valid JSON"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_expectations_always_pass() {
        assert!(validate(&Expectations::default(), &response(503, "")).is_ok());
    }
}
