use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{BodySource, RequestSpec};
use crate::state::ResourceState;

static OUTPUTS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{self\.outputs\.([A-Za-z0-9_]+)\}").expect("outputs interpolation pattern")
});

const ID_PATTERN: &str = "${self.id}";

/// Read-only snapshot of prior state visible to destroy-time template
/// expansion.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    pub id: String,
    pub outputs: HashMap<String, String>,
    pub status_code: u16,
    pub response_body: String,
}

impl InterpolationContext {
    pub fn from_state(prior: &ResourceState) -> Self {
        Self {
            id: prior.id.clone(),
            outputs: prior.outputs.clone(),
            status_code: prior.status_code,
            response_body: prior.response_body.clone().unwrap_or_default(),
        }
    }
}

/// Expand `${self.id}` and `${self.outputs.KEY}` inside `text`.
///
/// An unknown outputs key fails the expansion; unrecognized `${self.…}`
/// forms are left unchanged.
pub fn interpolate(text: &str, context: &InterpolationContext) -> Result<String> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let mut missing: Option<String> = None;
    let replaced = OUTPUTS_PATTERN.replace_all(text, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match context.outputs.get(key) {
            Some(value) => {
                log::trace!("interpolated ${{self.outputs.{key}}}");
                value.clone()
            }
            None => {
                if missing.is_none() {
                    missing = Some(key.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    if let Some(key) = missing {
        return Err(Error::InterpolationKeyMissing(key));
    }

    Ok(replaced.replace(ID_PATTERN, &context.id))
}

/// Expand every template-bearing string field of a destroy spec against
/// the prior state. Pure: the stored spec is never mutated in place.
pub fn expand_spec(spec: &RequestSpec, context: &InterpolationContext) -> Result<RequestSpec> {
    let mut expanded = spec.clone();

    expanded.url = interpolate(&spec.url, context)?;

    for value in expanded.headers.values_mut() {
        *value = interpolate(value, context)?;
    }
    for entry in expanded.header_entries.iter_mut() {
        entry.value = interpolate(&entry.value, context)?;
    }
    for value in expanded.query.values_mut() {
        *value = interpolate(value, context)?;
    }

    expanded.body = match &spec.body {
        BodySource::Raw(content) => BodySource::Raw(interpolate(content, context)?),
        BodySource::Json(source) => BodySource::Json(interpolate(source, context)?),
        other => other.clone(),
    };

    Ok(expanded)
}
