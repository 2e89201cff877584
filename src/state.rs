use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::executor::ExecuteOutcome;
use crate::models::{BodySource, RequestSpec};

/// Persisted state for one managed request resource. Built after a
/// successful apply and read back as the interpolation source on destroy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub status_code: u16,
    pub response_headers: HashMap<String, String>,
    #[serde(default)]
    pub response_body: Option<String>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    pub last_attempt_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Which role the spec is playing: a managed resource or a read-only
/// data source. Only affects the body-persistence default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Resource,
    DataSource,
}

/// Stable resource identifier: first 16 hex chars of SHA-256 over
/// `url|method|body-content`.
pub fn resource_id(spec: &RequestSpec) -> String {
    let body_content = match &spec.body {
        BodySource::Raw(content) => content.as_str(),
        BodySource::Json(source) => source.as_str(),
        BodySource::File(path) => path.to_str().unwrap_or_default(),
        BodySource::None => "",
    };

    let mut hasher = Sha256::new();
    hasher.update(spec.url.as_bytes());
    hasher.update(b"|");
    hasher.update(spec.method.as_bytes());
    hasher.update(b"|");
    hasher.update(body_content.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

/// Whether the response body should be persisted in state.
///
/// An explicit value always wins. Resources default to storing the body,
/// except when extract rules are present (the outputs usually make the
/// body redundant). Data sources default to not storing it.
pub fn should_store_body(role: Role, explicit: Option<bool>, has_extract_rules: bool) -> bool {
    if let Some(value) = explicit {
        return value;
    }
    match role {
        Role::Resource => !has_extract_rules,
        Role::DataSource => false,
    }
}

impl ResourceState {
    /// Snapshot an execute outcome into persistable state, applying the
    /// body-persistence policy.
    pub fn capture(spec: &RequestSpec, outcome: &ExecuteOutcome, role: Role) -> Self {
        let store_body =
            should_store_body(role, spec.store_response_body, !spec.extract.is_empty());

        Self {
            id: resource_id(spec),
            status_code: outcome.response.status_code,
            response_headers: outcome.response.headers.clone(),
            response_body: store_body.then(|| outcome.response.body.clone()),
            outputs: outcome.outputs.clone(),
            last_attempt_count: outcome.response.attempt_count,
            last_error: outcome.response.error.clone(),
        }
    }
}
