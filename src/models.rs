use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::redact::{self, Secret};

/// Declarative description of one HTTP request, consumed per operation.
///
/// Furnished by the hosting plugin's configuration parser; the executor
/// treats it as immutable input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    /// Single-valued headers; later merge stages overwrite earlier ones.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Ordered header entries; duplicates of the same name are appended.
    #[serde(default)]
    pub header_entries: Vec<HeaderEntry>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub body: BodySource,
    #[serde(default)]
    pub auth: AuthSpec,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub insecure_skip_verify: Option<bool>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub retry: Option<RetrySpec>,
    #[serde(default)]
    pub retry_until: Option<PollCondition>,
    #[serde(default)]
    pub expect: Option<Expectations>,
    #[serde(default)]
    pub extract: Vec<ExtractRule>,
    #[serde(default)]
    pub response_sensitive: Option<bool>,
    #[serde(default)]
    pub store_response_body: Option<bool>,
    /// Request executed when the resource is destroyed. String fields may
    /// reference prior state through `${self.id}` and `${self.outputs.KEY}`.
    #[serde(default)]
    pub on_destroy: Option<Box<RequestSpec>>,
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            header_entries: Vec::new(),
            query: HashMap::new(),
            body: BodySource::None,
            auth: AuthSpec::None,
            timeout_ms: None,
            insecure_skip_verify: None,
            proxy_url: None,
            retry: None,
            retry_until: None,
            expect: None,
            extract: Vec::new(),
            response_sensitive: None,
            store_response_body: None,
            on_destroy: None,
        }
    }
}

/// One `(name, value)` header entry; repeated names send repeated headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Request body source. At most one variant carries content by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySource {
    /// Sent verbatim.
    Raw(String),
    /// Validated and re-serialized as compact JSON before sending.
    Json(String),
    /// Read fully into memory at build time.
    File(PathBuf),
    #[default]
    None,
}

/// Request authentication. A single `Authorization` header is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSpec {
    #[default]
    None,
    Basic { username: String, password: Secret },
    Bearer { token: Secret },
}

/// Retry configuration as written in the spec; absent fields are filled
/// with defaults by [`crate::retry::RetryPolicy::from_spec`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrySpec {
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub min_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub backoff: Option<Backoff>,
    #[serde(default)]
    pub jitter: Option<bool>,
    #[serde(default)]
    pub retry_on_status_codes: Option<Vec<u16>>,
    #[serde(default)]
    pub respect_retry_after: Option<bool>,
}

/// Backoff strategy for computing the delay between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Linear,
    #[default]
    Exponential,
}

/// Poll condition: every present sub-condition must hold for the retry
/// loop to finish successfully. An empty condition is always satisfied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollCondition {
    #[serde(default)]
    pub status_codes: Vec<u16>,
    #[serde(default)]
    pub json_path_equals: HashMap<String, String>,
    #[serde(default)]
    pub header_equals: HashMap<String, String>,
    #[serde(default)]
    pub body_regex: Option<String>,
}

impl PollCondition {
    pub fn is_empty(&self) -> bool {
        self.status_codes.is_empty()
            && self.json_path_equals.is_empty()
            && self.header_equals.is_empty()
            && self.body_regex.is_none()
    }
}

/// Assertions applied to the final response after the retry loop exits
/// successfully.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    #[serde(default)]
    pub status_codes: Vec<u16>,
    #[serde(default)]
    pub header_present: Vec<String>,
    #[serde(default)]
    pub json_path_exists: Vec<String>,
    #[serde(default)]
    pub json_path_equals: HashMap<String, String>,
}

impl Expectations {
    pub fn wants_json(&self) -> bool {
        !self.json_path_exists.is_empty() || !self.json_path_equals.is_empty()
    }
}

/// Declaration producing one named scalar in the operation outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractRule {
    pub name: String,
    pub source: ExtractSource,
}

/// Where an extracted value comes from. The configuration parser resolves
/// the header-wins precedence before the core sees the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractSource {
    JsonPath(String),
    Header(String),
}

/// Provider-wide defaults merged under every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefaults {
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub bearer_token: Option<Secret>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub ca_cert_pem: Option<String>,
    #[serde(default)]
    pub client_cert_pem: Option<String>,
    #[serde(default)]
    pub client_key_pem: Option<String>,
    #[serde(default = "redact::default_redact_headers")]
    pub redact_headers: Vec<String>,
    #[serde(default = "default_max_response_body_bytes")]
    pub max_response_body_bytes: usize,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            default_headers: HashMap::new(),
            basic_auth: None,
            bearer_token: None,
            timeout_ms: None,
            insecure_skip_verify: false,
            proxy_url: None,
            ca_cert_pem: None,
            client_cert_pem: None,
            client_key_pem: None,
            redact_headers: redact::default_redact_headers(),
            max_response_body_bytes: default_max_response_body_bytes(),
        }
    }
}

fn default_max_response_body_bytes() -> usize {
    1_048_576
}

/// Basic-auth credential pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: Secret,
}

/// Result of driving one request through the retry loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseResult {
    /// 0 when the transport never produced a response.
    pub status_code: u16,
    /// Header names lowercased; multi-valued headers joined with `", "`.
    pub headers: HashMap<String, String>,
    /// Possibly truncated with the truncation sentinel.
    pub body: String,
    /// Number of transport attempts actually made.
    pub attempt_count: u32,
    /// Redacted error message, if the final attempt failed.
    pub error: Option<String>,
}

impl ResponseResult {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Non-fatal warnings accumulated during an operation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
