use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use rand::Rng;
use tokio::time::Instant;

use crate::client::Transport;
use crate::conditions;
use crate::error::{Error, Result};
use crate::models::{Backoff, PollCondition, ResponseResult, RetrySpec};

const RETRY_AFTER_HEADER: &str = "retry-after";

/// Effective retry policy after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: Backoff,
    pub jitter: bool,
    pub retry_on_status_codes: BTreeSet<u16>,
    pub respect_retry_after: bool,
}

impl RetryPolicy {
    /// Policy for a spec with neither a retry block nor a poll condition:
    /// exactly one attempt, nothing retryable.
    pub fn single_attempt() -> Self {
        Self {
            attempts: 1,
            min_delay_ms: 0,
            max_delay_ms: 0,
            backoff: Backoff::Fixed,
            jitter: false,
            retry_on_status_codes: BTreeSet::new(),
            respect_retry_after: false,
        }
    }

    /// Default policy when a poll condition is set without an explicit
    /// retry block.
    pub fn polling_default() -> Self {
        Self {
            attempts: 60,
            min_delay_ms: 1_000,
            max_delay_ms: 5_000,
            backoff: Backoff::Exponential,
            jitter: true,
            retry_on_status_codes: BTreeSet::new(),
            respect_retry_after: true,
        }
    }

    /// Fill the absent fields of a retry block with its defaults and
    /// clamp the delay bounds so `min <= max` holds.
    pub fn from_spec(spec: &RetrySpec) -> Self {
        let min_delay_ms = spec.min_delay_ms.unwrap_or(250);
        let max_delay_ms = spec.max_delay_ms.unwrap_or(5_000).max(min_delay_ms);
        Self {
            attempts: spec.attempts.unwrap_or(20).max(1),
            min_delay_ms,
            max_delay_ms,
            backoff: spec.backoff.unwrap_or(Backoff::Exponential),
            jitter: spec.jitter.unwrap_or(true),
            // The default set fills in only when the field is absent; an
            // explicitly empty set means no status is retryable.
            retry_on_status_codes: spec
                .retry_on_status_codes
                .clone()
                .unwrap_or_else(|| vec![408, 429, 500, 502, 503, 504])
                .into_iter()
                .collect(),
            respect_retry_after: spec.respect_retry_after.unwrap_or(true),
        }
    }

    /// Resolve the effective policy for a spec: an explicit retry block
    /// wins, a poll condition alone gets the polling default, otherwise a
    /// single attempt.
    pub fn resolve(retry: Option<&RetrySpec>, poll: Option<&PollCondition>) -> Self {
        match (retry, poll) {
            (Some(spec), _) => Self::from_spec(spec),
            (None, Some(_)) => Self::polling_default(),
            (None, None) => Self::single_attempt(),
        }
    }

    fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status_codes.contains(&status)
    }

    /// Base delay for 1-indexed attempt `n`, before jitter, capped at
    /// `max_delay_ms`.
    pub(crate) fn base_delay_ms(&self, attempt: u32) -> u64 {
        let base = match self.backoff {
            Backoff::Fixed => self.min_delay_ms,
            Backoff::Linear => self.min_delay_ms.saturating_mul(u64::from(attempt)),
            Backoff::Exponential => {
                let exponent = attempt.saturating_sub(1).min(31);
                let multiplier = 1_u128 << exponent;
                u128::from(self.min_delay_ms)
                    .saturating_mul(multiplier)
                    .min(u128::from(u64::MAX)) as u64
            }
        };
        base.min(self.max_delay_ms)
    }

    /// Delay before the attempt following attempt `n`. A parsable
    /// `Retry-After` value is honored verbatim, bypassing the delay
    /// bounds and jitter; otherwise the backoff base plus up to 25%
    /// uniform jitter applies.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if self.respect_retry_after {
            if let Some(delay) = retry_after.and_then(parse_retry_after) {
                return delay;
            }
        }

        let base = self.base_delay_ms(attempt);
        let jitter = if self.jitter && base > 0 {
            rand::rng().random_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}

/// Parse a `Retry-After` header value: integer seconds, or an HTTP-date
/// (RFC 1123, RFC 850, ANSI C asctime). Dates in the past and unparsable
/// values yield `None` so the computed backoff applies instead.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let when = httpdate::parse_http_date(value).ok()?;
    when.duration_since(SystemTime::now()).ok()
}

/// Drive a request through up to `policy.attempts` transport attempts.
///
/// Transport errors are always retryable while attempts remain. With a
/// poll condition the condition alone decides success; without one, a
/// status on the policy's retry list keeps the loop going and any other
/// status is a success. The deadline is checked before every attempt and
/// every sleep, and sleeps abort when it elapses.
pub async fn execute_with_retry(
    transport: &Transport,
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
    poll: Option<&PollCondition>,
    deadline: Option<Instant>,
) -> Result<ResponseResult> {
    let attempts = policy.attempts.max(1);
    let mut last_status: Option<u16> = None;
    let mut last_unsatisfied: Vec<String> = Vec::new();
    let mut last_transport_error: Option<String> = None;

    for attempt in 1..=attempts {
        if deadline_elapsed(deadline) {
            return Err(Error::Cancelled {
                last_status,
                unsatisfied: last_unsatisfied,
            });
        }

        log::debug!("executing HTTP attempt {attempt}/{attempts}");

        let cloned = request
            .try_clone()
            .ok_or_else(|| Error::InvalidSpec("request body is not cloneable".to_string()))?;

        match transport.execute_once(cloned, deadline).await {
            Err(Error::Cancelled { .. }) => {
                return Err(Error::Cancelled {
                    last_status,
                    unsatisfied: last_unsatisfied,
                });
            }
            Err(Error::Transport { message, .. }) => {
                log::debug!("attempt {attempt} failed in transport: {message}");
                if attempt >= attempts {
                    return Err(Error::Transport {
                        message,
                        attempts,
                    });
                }
                last_transport_error = Some(message);
                let delay = policy.delay_for_attempt(attempt, None);
                sleep_or_cancel(delay, deadline, last_status, &last_unsatisfied).await?;
            }
            Err(other) => return Err(other),
            Ok(mut result) => {
                last_status = Some(result.status_code);

                if let Some(condition) = poll {
                    let (satisfied, unsatisfied) = conditions::evaluate(condition, &result);
                    if satisfied {
                        result.attempt_count = attempt;
                        return Ok(result);
                    }
                    if attempt >= attempts {
                        return Err(Error::PollingExhausted {
                            attempts,
                            reasons: unsatisfied,
                        });
                    }

                    log::debug!(
                        "attempt {attempt}: poll condition not met ({} reason(s)), retrying",
                        unsatisfied.len()
                    );
                    last_unsatisfied = unsatisfied;
                    let retry_after = result.header(RETRY_AFTER_HEADER);
                    let delay = policy.delay_for_attempt(attempt, retry_after);
                    sleep_or_cancel(delay, deadline, last_status, &last_unsatisfied).await?;
                    continue;
                }

                if policy.should_retry_status(result.status_code) {
                    if attempt >= attempts {
                        return Err(Error::RetryExhausted {
                            attempts,
                            last_status: result.status_code,
                        });
                    }

                    log::debug!(
                        "attempt {attempt}: status {} is retryable, retrying",
                        result.status_code
                    );
                    let retry_after = result.header(RETRY_AFTER_HEADER);
                    let delay = policy.delay_for_attempt(attempt, retry_after);
                    sleep_or_cancel(delay, deadline, last_status, &last_unsatisfied).await?;
                    continue;
                }

                result.attempt_count = attempt;
                return Ok(result);
            }
        }
    }

    // Unreachable: every loop exit above returns. Kept as a hard failure
    // in case the attempt arithmetic ever changes.
    Err(Error::Transport {
        message: last_transport_error.unwrap_or_else(|| "no attempts were made".to_string()),
        attempts,
    })
}

fn deadline_elapsed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Sleep for `delay`, aborting with [`Error::Cancelled`] if the deadline
/// elapses first.
async fn sleep_or_cancel(
    delay: Duration,
    deadline: Option<Instant>,
    last_status: Option<u16>,
    unsatisfied: &[String],
) -> Result<()> {
    log::debug!("sleeping {}ms before next attempt", delay.as_millis());
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(()),
                _ = tokio::time::sleep_until(deadline) => Err(Error::Cancelled {
                    last_status,
                    unsatisfied: unsatisfied.to_vec(),
                }),
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backoff: Backoff, min: u64, max: u64) -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            min_delay_ms: min,
            max_delay_ms: max,
            backoff,
            jitter: false,
            retry_on_status_codes: BTreeSet::new(),
            respect_retry_after: false,
        }
    }

    #[test]
    fn test_from_spec_fills_defaults() {
        let effective = RetryPolicy::from_spec(&RetrySpec::default());
        assert_eq!(effective.attempts, 20);
        assert_eq!(effective.min_delay_ms, 250);
        assert_eq!(effective.max_delay_ms, 5_000);
        assert_eq!(effective.backoff, Backoff::Exponential);
        assert!(effective.jitter);
        assert!(effective.respect_retry_after);
        assert_eq!(
            effective.retry_on_status_codes,
            [408, 429, 500, 502, 503, 504].into_iter().collect()
        );
    }

    #[test]
    fn test_from_spec_honors_explicitly_empty_status_codes() {
        let spec = RetrySpec {
            retry_on_status_codes: Some(Vec::new()),
            ..Default::default()
        };
        let effective = RetryPolicy::from_spec(&spec);
        assert!(effective.retry_on_status_codes.is_empty());
        assert!(!effective.should_retry_status(503));
    }

    #[test]
    fn test_from_spec_clamps_delay_bounds() {
        let spec = RetrySpec {
            min_delay_ms: Some(9_000),
            max_delay_ms: Some(100),
            ..Default::default()
        };
        let effective = RetryPolicy::from_spec(&spec);
        assert!(effective.min_delay_ms <= effective.max_delay_ms);
        assert_eq!(effective.max_delay_ms, 9_000);
    }

    #[test]
    fn test_resolve_prefers_explicit_retry_block() {
        let retry = RetrySpec {
            attempts: Some(3),
            ..Default::default()
        };
        let poll = PollCondition::default();
        assert_eq!(RetryPolicy::resolve(Some(&retry), Some(&poll)).attempts, 3);
        assert_eq!(RetryPolicy::resolve(None, Some(&poll)), RetryPolicy::polling_default());
        assert_eq!(RetryPolicy::resolve(None, None).attempts, 1);
    }

    #[test]
    fn test_fixed_backoff_base_delay() {
        let p = policy(Backoff::Fixed, 100, 1_000);
        assert_eq!(p.base_delay_ms(1), 100);
        assert_eq!(p.base_delay_ms(4), 100);
    }

    #[test]
    fn test_linear_backoff_base_delay() {
        let p = policy(Backoff::Linear, 100, 1_000);
        assert_eq!(p.base_delay_ms(1), 100);
        assert_eq!(p.base_delay_ms(3), 300);
        assert_eq!(p.base_delay_ms(50), 1_000);
    }

    #[test]
    fn test_exponential_backoff_base_delay() {
        let p = policy(Backoff::Exponential, 100, 10_000);
        assert_eq!(p.base_delay_ms(1), 100);
        assert_eq!(p.base_delay_ms(2), 200);
        assert_eq!(p.base_delay_ms(3), 400);
        assert_eq!(p.base_delay_ms(8), 10_000);
    }

    #[test]
    fn test_base_delay_is_monotonic_until_cap() {
        for backoff in [Backoff::Linear, Backoff::Exponential] {
            let p = policy(backoff, 50, 5_000);
            let mut previous = 0;
            for attempt in 1..=20 {
                let delay = p.base_delay_ms(attempt);
                assert!(delay >= previous, "{backoff:?} attempt {attempt}");
                assert!(delay <= 5_000);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_exponential_backoff_does_not_overflow() {
        let p = policy(Backoff::Exponential, u64::MAX / 2, u64::MAX);
        assert_eq!(p.base_delay_ms(64), u64::MAX);
    }

    #[test]
    fn test_jitter_bounded_by_quarter_of_base() {
        let mut p = policy(Backoff::Fixed, 400, 400);
        p.jitter = true;
        for _ in 0..50 {
            let delay = p.delay_for_attempt(1, None).as_millis() as u64;
            assert!((400..=500).contains(&delay));
        }
    }

    #[test]
    fn test_retry_after_seconds_override_bypasses_bounds() {
        let mut p = policy(Backoff::Fixed, 100, 200);
        p.respect_retry_after = true;
        assert_eq!(p.delay_for_attempt(1, Some("2")), Duration::from_secs(2));
    }

    #[test]
    fn test_retry_after_ignored_when_not_respected() {
        let p = policy(Backoff::Fixed, 100, 200);
        assert_eq!(p.delay_for_attempt(1, Some("2")), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_retry_after_future_http_date() {
        let future = SystemTime::now() + Duration::from_secs(60);
        let formatted = httpdate::fmt_http_date(future);
        let parsed = parse_retry_after(&formatted).unwrap();
        assert!(parsed <= Duration::from_secs(60));
        assert!(parsed > Duration::from_secs(50));
    }

    #[test]
    fn test_parse_retry_after_rejects_past_date_and_garbage() {
        let past = SystemTime::now() - Duration::from_secs(3600);
        assert_eq!(parse_retry_after(&httpdate::fmt_http_date(past)), None);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-5"), None);
    }
}
