use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::models::{ProviderDefaults, RequestSpec, ResponseResult};
use crate::redact::{self, TRUNCATION_SENTINEL};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Transport layer for one operation: a configured HTTP client plus the
/// response-handling knobs shared by every attempt.
///
/// Read-only after construction, so reuse across attempts is safe.
#[derive(Debug)]
pub struct Transport {
    client: reqwest::Client,
    max_response_body_bytes: usize,
    redact_headers: Vec<String>,
}

impl Transport {
    /// Build a transport from provider defaults, honoring the request
    /// spec's per-request overrides (timeout, skip-verify, proxy).
    pub fn new(spec: &RequestSpec, defaults: &ProviderDefaults) -> Result<Self> {
        let timeout_ms = spec.timeout_ms.or(defaults.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS);
        let insecure = spec
            .insecure_skip_verify
            .unwrap_or(defaults.insecure_skip_verify);
        let proxy_url = spec.proxy_url.as_deref().or(defaults.proxy_url.as_deref());

        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_millis(timeout_ms));

        if insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(pem) = &defaults.ca_cert_pem {
            let certificate = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| Error::InvalidConfig(format!("invalid ca_cert_pem: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        if let (Some(cert), Some(key)) = (&defaults.client_cert_pem, &defaults.client_key_pem) {
            let mut pem = cert.clone().into_bytes();
            pem.extend_from_slice(key.as_bytes());
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| Error::InvalidConfig(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        if let Some(url) = proxy_url {
            let proxy = reqwest::Proxy::all(url)
                .map_err(|e| Error::InvalidConfig(format!("invalid proxy URL '{url}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_response_body_bytes: defaults.max_response_body_bytes,
            redact_headers: defaults.redact_headers.clone(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute one transport attempt and read the response up to the body
    /// cap. Transport failures come back as [`Error::Transport`] with the
    /// message already redacted; an elapsed deadline becomes
    /// [`Error::Cancelled`].
    pub async fn execute_once(
        &self,
        request: reqwest::RequestBuilder,
        deadline: Option<Instant>,
    ) -> Result<ResponseResult> {
        let request = request
            .build()
            .map_err(|e| Error::InvalidSpec(format!("failed to build request: {e}")))?;
        let sensitive = sensitive_header_values(request.headers(), &self.redact_headers);

        match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.send_and_read(request, &sensitive))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::Cancelled {
                        last_status: None,
                        unsatisfied: Vec::new(),
                    }),
                }
            }
            None => self.send_and_read(request, &sensitive).await,
        }
    }

    async fn send_and_read(
        &self,
        request: reqwest::Request,
        sensitive: &[String],
    ) -> Result<ResponseResult> {
        let mut response = self
            .client
            .execute(request)
            .await
            .map_err(|e| self.transport_error(e, sensitive))?;

        let status_code = response.status().as_u16();
        let headers = join_headers(response.headers());

        let cap = self.max_response_body_bytes;
        let mut buffer: Vec<u8> = Vec::new();
        let mut truncated = false;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(self.transport_error(e, sensitive)),
            };
            // Only mark truncated when bytes are actually discarded; a
            // body of exactly `cap` bytes is complete.
            if buffer.len() + chunk.len() > cap {
                let take = cap.saturating_sub(buffer.len());
                buffer.extend_from_slice(&chunk[..take]);
                truncated = true;
                break;
            }
            buffer.extend_from_slice(&chunk);
        }

        let mut body = String::from_utf8_lossy(&buffer).into_owned();
        if truncated {
            body.push_str(TRUNCATION_SENTINEL);
        }

        log::debug!(
            "HTTP attempt completed: status={status_code} body_bytes={} truncated={truncated}",
            buffer.len()
        );

        Ok(ResponseResult {
            status_code,
            headers,
            body,
            attempt_count: 1,
            error: None,
        })
    }

    fn transport_error(&self, error: reqwest::Error, sensitive: &[String]) -> Error {
        Error::Transport {
            message: redact::error_message(&error.to_string(), sensitive),
            attempts: 1,
        }
    }
}

/// Snapshot response headers with lowercase names; repeated headers are
/// joined with `", "` in the order received.
fn join_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut joined = HashMap::new();
    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        joined.insert(name.as_str().to_string(), value);
    }
    joined
}

/// Values of request headers whose names are on the redaction list; these
/// must never surface in diagnostics.
fn sensitive_header_values(headers: &HeaderMap, redact_list: &[String]) -> Vec<String> {
    let mut values = Vec::new();
    for name in redact_list {
        for value in headers.get_all(name.as_str()).iter() {
            if let Ok(value) = value.to_str() {
                values.push(value.to_string());
            }
        }
    }
    values
}
