use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const REDACTED: &str = "[REDACTED]";
pub const TRUNCATION_SENTINEL: &str = "... [TRUNCATED]";

/// Header names whose values are hidden in diagnostics unless the provider
/// configures its own list.
pub const DEFAULT_REDACT_HEADERS: [&str; 3] = ["Authorization", "Proxy-Authorization", "X-Api-Key"];

/// A string that must not appear in logs or diagnostics.
///
/// `Debug` prints the redaction marker; the raw value is only reachable
/// through [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Return a copy of `headers` with every value whose name appears in
/// `redact_list` replaced by the redaction marker. Names match
/// case-insensitively.
pub fn headers(
    headers: &HashMap<String, String>,
    redact_list: &[String],
) -> HashMap<String, String> {
    if redact_list.is_empty() {
        return headers.clone();
    }

    headers
        .iter()
        .map(|(name, value)| {
            let redact = redact_list.iter().any(|r| r.eq_ignore_ascii_case(name));
            let value = if redact { REDACTED.to_string() } else { value.clone() };
            (name.clone(), value)
        })
        .collect()
}

/// Replace every occurrence of each sensitive value inside `message` with
/// the redaction marker. Empty values are skipped so they cannot blank out
/// the whole message.
pub fn error_message(message: &str, sensitive_values: &[String]) -> String {
    let mut result = message.to_string();
    for value in sensitive_values {
        if !value.is_empty() && result.contains(value.as_str()) {
            result = result.replace(value.as_str(), REDACTED);
        }
    }
    result
}

/// The default redaction list as owned strings, for provider defaults.
pub fn default_redact_headers() -> Vec<String> {
    DEFAULT_REDACT_HEADERS.iter().map(|h| h.to_string()).collect()
}
