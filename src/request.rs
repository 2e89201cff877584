use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;

use crate::error::{Error, Result};
use crate::models::{AuthSpec, BodySource, ProviderDefaults, RequestSpec};

/// Merge provider defaults and a request spec into a ready-to-send
/// request builder.
///
/// The returned builder is cloned per attempt by the retry loop. Merge
/// rules:
/// - query parameters are added to any query already embedded in the URL
/// - headers: provider defaults, then the spec's header map (overwriting),
///   then the ordered header entries (appending duplicates)
/// - a JSON body is validated, re-serialized compactly and labeled
///   `application/json` unless a Content-Type was already merged in
/// - request-level auth beats provider-level auth; bearer beats basic at
///   the provider level; exactly one `Authorization` header is written
pub fn build_request(
    client: &reqwest::Client,
    spec: &RequestSpec,
    defaults: &ProviderDefaults,
) -> Result<reqwest::RequestBuilder> {
    let method = Method::from_bytes(spec.method.as_bytes())
        .map_err(|_| Error::InvalidSpec(format!("invalid HTTP method '{}'", spec.method)))?;
    let url = reqwest::Url::parse(&spec.url)
        .map_err(|e| Error::InvalidSpec(format!("invalid URL '{}': {e}", spec.url)))?;

    let mut builder = client.request(method, url);

    if !spec.query.is_empty() {
        let pairs: Vec<(&str, &str)> = spec
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        builder = builder.query(&pairs);
    }

    let mut headers = HeaderMap::new();
    for (name, value) in &defaults.default_headers {
        let (name, value) = parse_header(name, value)?;
        headers.insert(name, value);
    }
    for (name, value) in &spec.headers {
        let (name, value) = parse_header(name, value)?;
        headers.insert(name, value);
    }
    for entry in &spec.header_entries {
        let (name, value) = parse_header(&entry.name, &entry.value)?;
        headers.append(name, value);
    }

    match &spec.body {
        BodySource::None => {}
        BodySource::Raw(content) => {
            builder = builder.body(content.clone());
        }
        BodySource::Json(source) => {
            let value: serde_json::Value = serde_json::from_str(source)
                .map_err(|e| Error::InvalidSpec(format!("invalid JSON body: {e}")))?;
            let bytes = serde_json::to_vec(&value)
                .map_err(|e| Error::InvalidSpec(format!("failed to serialize JSON body: {e}")))?;
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            builder = builder.body(bytes);
        }
        BodySource::File(path) => {
            let bytes = std::fs::read(path).map_err(|e| {
                Error::InvalidSpec(format!("failed to read body file '{}': {e}", path.display()))
            })?;
            builder = builder.body(bytes);
        }
    }

    builder = builder.headers(headers);

    builder = match &spec.auth {
        AuthSpec::Bearer { token } => builder.bearer_auth(token.expose()),
        AuthSpec::Basic { username, password } => {
            builder.basic_auth(username, Some(password.expose()))
        }
        AuthSpec::None => {
            if let Some(token) = &defaults.bearer_token {
                builder.bearer_auth(token.expose())
            } else if let Some(basic) = &defaults.basic_auth {
                builder.basic_auth(&basic.username, Some(basic.password.expose()))
            } else {
                builder
            }
        }
    };

    log::debug!("built {} request to {}", spec.method, spec.url);
    Ok(builder)
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::InvalidSpec(format!("invalid header name '{name}'")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidSpec(format!("invalid value for header '{name}'")))?;
    Ok((name, value))
}
