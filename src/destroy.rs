use tokio::time::Instant;

use crate::client::Transport;
use crate::error::Result;
use crate::executor::validate_spec;
use crate::expectations;
use crate::interpolation::{expand_spec, InterpolationContext};
use crate::models::{Diagnostics, ProviderDefaults, RequestSpec};
use crate::request::build_request;
use crate::retry::{execute_with_retry, RetryPolicy};
use crate::state::ResourceState;

/// Run the destroy-time request for a resource.
///
/// Without an `on_destroy` sub-spec this is a no-op success and the host
/// may drop the state entry immediately. Otherwise the sub-spec's
/// template fields are expanded against the prior state and the expanded
/// spec runs through the full pipeline with its own retry and poll
/// configuration.
///
/// Any error (a missing interpolation key, a transport failure, an
/// unsatisfied expectation) propagates to the host, which must retain
/// the state so the destroy can be retried. Only an `Ok` return signals
/// that the state entry may be removed.
pub async fn destroy(
    prior: &ResourceState,
    spec: &RequestSpec,
    defaults: &ProviderDefaults,
    deadline: Option<Instant>,
) -> Result<Diagnostics> {
    let Some(on_destroy) = spec.on_destroy.as_deref() else {
        log::info!("no on_destroy request configured, nothing to execute");
        return Ok(Diagnostics::default());
    };

    let context = InterpolationContext::from_state(prior);
    let expanded = expand_spec(on_destroy, &context)?;
    validate_spec(&expanded)?;

    log::info!("executing destroy request {} {}", expanded.method, expanded.url);

    let transport = Transport::new(&expanded, defaults)?;
    let request = build_request(transport.client(), &expanded, defaults)?;
    let policy = RetryPolicy::resolve(expanded.retry.as_ref(), expanded.retry_until.as_ref());

    let response = execute_with_retry(
        &transport,
        request,
        &policy,
        expanded.retry_until.as_ref(),
        deadline,
    )
    .await?;

    if let Some(expect) = &expanded.expect {
        expectations::validate(expect, &response)?;
    }

    log::info!(
        "destroy request succeeded with status {} after {} attempt(s)",
        response.status_code,
        response.attempt_count
    );

    Ok(Diagnostics::default())
}
