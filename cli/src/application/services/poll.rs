//! Deadline-driven poll loop shared by the template, boot and teardown waits.
//!
//! The loop never reports a timeout before `timeout` has elapsed on the
//! injected clock, and always checks once more after its final sleep.

use std::future::Future;
use std::time::Duration;

use crate::application::ports::{Clock, CpResult};
use crate::domain::config::TimeoutsConfig;

/// Smallest sleep between checks, so a zero interval cannot spin.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// Poll policies for each wait in the create and teardown workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicies {
    pub template: PollPolicy,
    pub boot: PollPolicy,
    pub password: PollPolicy,
    pub teardown: PollPolicy,
}

impl PollPolicies {
    #[must_use]
    pub fn from_config(config: &TimeoutsConfig) -> Self {
        let interval = config.poll_interval();
        let policy = |secs| PollPolicy::new(interval, Duration::from_secs(secs));
        Self {
            template: policy(config.template_secs),
            boot: policy(config.boot_secs),
            password: policy(config.password_secs),
            teardown: policy(config.teardown_secs),
        }
    }
}

impl Default for PollPolicies {
    fn default() -> Self {
        Self::from_config(&TimeoutsConfig::default())
    }
}

/// One check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check<T> {
    Ready(T),
    /// Not there yet; carries the observed status for logs and timeouts.
    Pending(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    TimedOut {
        last_status: Option<String>,
        waited: Duration,
    },
    Failed(E),
}

/// Check until `Ready`, a fatal error, or the deadline.
///
/// # Errors
///
/// `TimedOut` once `policy.timeout` has elapsed with only `Pending` results;
/// `Failed` as soon as the check returns an error.
pub async fn poll_until<T, E, F, Fut>(
    clock: &impl Clock,
    policy: &PollPolicy,
    what: &str,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Check<T>, E>>,
{
    let started = clock.now();
    let interval = policy.interval.max(MIN_INTERVAL);
    let mut last_status = None;
    let mut tick = 0u32;
    loop {
        tick += 1;
        match check().await {
            Ok(Check::Ready(value)) => {
                tracing::debug!(what, tick, "poll ready");
                return Ok(value);
            }
            Ok(Check::Pending(status)) => {
                tracing::debug!(what, tick, %status, "poll pending");
                last_status = Some(status);
            }
            Err(err) => return Err(PollError::Failed(err)),
        }
        let waited = clock.now().saturating_duration_since(started);
        if waited >= policy.timeout {
            tracing::info!(what, waited_secs = waited.as_secs(), "poll timed out");
            return Err(PollError::TimedOut {
                last_status,
                waited,
            });
        }
        clock.sleep(interval.min(policy.timeout - waited)).await;
    }
}

/// Fold a transient failure that outlived its retries into a pending tick.
///
/// # Errors
///
/// Passes non-transient errors through.
pub fn transient_as_pending<T>(result: CpResult<Check<T>>) -> CpResult<Check<T>> {
    match result {
        Err(err) if err.is_transient() => Ok(Check::Pending(format!("unreachable: {err}"))),
        other => other,
    }
}
