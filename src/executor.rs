use std::collections::HashMap;

use regex::Regex;
use tokio::time::Instant;

use crate::client::Transport;
use crate::error::{Error, Result};
use crate::expectations;
use crate::extraction;
use crate::models::{Diagnostics, ProviderDefaults, RequestSpec, ResponseResult};
use crate::redact;
use crate::request::build_request;
use crate::retry::{execute_with_retry, RetryPolicy};

/// Result of a successful execute operation.
#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub response: ResponseResult,
    /// Named scalars produced by the spec's extract rules.
    pub outputs: HashMap<String, String>,
    /// Non-fatal warnings (extraction misses).
    pub diagnostics: Diagnostics,
}

/// Execute a request spec: build the request, drive it through the retry
/// loop, validate expectations and materialize extracted outputs.
///
/// Used for the create, read-refresh and update operations. `deadline`
/// is the host-supplied bound for the whole operation; on expiry the
/// loop returns [`Error::Cancelled`].
pub async fn execute(
    spec: &RequestSpec,
    defaults: &ProviderDefaults,
    deadline: Option<Instant>,
) -> Result<ExecuteOutcome> {
    validate_spec(spec)?;

    let transport = Transport::new(spec, defaults)?;
    let request = build_request(transport.client(), spec, defaults)?;
    let policy = RetryPolicy::resolve(spec.retry.as_ref(), spec.retry_until.as_ref());

    log::info!(
        "executing {} {} (attempts up to {})",
        spec.method,
        spec.url,
        policy.attempts
    );

    let response = execute_with_retry(
        &transport,
        request,
        &policy,
        spec.retry_until.as_ref(),
        deadline,
    )
    .await?;

    log::debug!(
        "response headers: {:?}",
        redact::headers(&response.headers, &defaults.redact_headers)
    );

    if let Some(expect) = &spec.expect {
        expectations::validate(expect, &response)?;
    }

    let mut diagnostics = Diagnostics::default();
    let outputs = extraction::extract(&spec.extract, &response, &mut diagnostics);

    log::info!(
        "request completed: status={} attempts={}",
        response.status_code,
        response.attempt_count
    );

    Ok(ExecuteOutcome {
        response,
        outputs,
        diagnostics,
    })
}

/// Spec checks that must fail before any attempt is made.
pub(crate) fn validate_spec(spec: &RequestSpec) -> Result<()> {
    if let Some(pattern) = spec.retry_until.as_ref().and_then(|c| c.body_regex.as_ref()) {
        Regex::new(pattern)
            .map_err(|e| Error::InvalidSpec(format!("invalid retry_until body_regex: {e}")))?;
    }
    Ok(())
}
