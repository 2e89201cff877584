use std::collections::HashMap;

use serde_json::Value;

use crate::json_path;
use crate::models::{Diagnostics, ExtractRule, ExtractSource, ResponseResult};

/// Materialize extract rules into the named outputs mapping.
///
/// Extraction never fails the operation: a missing header or unresolvable
/// JSON path yields an empty string plus a diagnostic warning. Duplicate
/// rule names overwrite, last write wins.
pub fn extract(
    rules: &[ExtractRule],
    response: &ResponseResult,
    diagnostics: &mut Diagnostics,
) -> HashMap<String, String> {
    let mut outputs = HashMap::new();
    if rules.is_empty() {
        return outputs;
    }

    let body_json: Option<Value> = serde_json::from_str(&response.body).ok();

    for rule in rules {
        if rule.name.is_empty() {
            continue;
        }

        let value = match &rule.source {
            ExtractSource::Header(name) => match response.header(name) {
                Some(v) => v.to_string(),
                None => {
                    diagnostics.warn(format!(
                        "extract '{}': header '{name}' not found in response",
                        rule.name
                    ));
                    String::new()
                }
            },
            ExtractSource::JsonPath(path) => match &body_json {
                Some(body) => match json_path::evaluate(body, path) {
                    Ok(found) => json_path::stringify(&found),
                    Err(err) => {
                        diagnostics.warn(format!("extract '{}': {err}", rule.name));
                        String::new()
                    }
                },
                None => {
                    diagnostics.warn(format!(
                        "extract '{}': response body is not valid JSON",
                        rule.name
                    ));
                    String::new()
                }
            },
        };

        log::debug!("extracted '{}' = '{value}'", rule.name);
        outputs.insert(rule.name.clone(), value);
    }

    outputs
}
