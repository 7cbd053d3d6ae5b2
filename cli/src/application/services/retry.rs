//! Exponential backoff around control-plane calls.
//!
//! Only `ControlPlaneError::is_transient()` failures are retried. Semantic
//! rejections (capacity, invalid spec, permission) surface on the first
//! attempt.

use std::future::Future;
use std::time::Duration;

use crate::application::ports::{Clock, CpResult};
use crate::domain::config::RetryConfig;

/// Longest single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// No retries at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based): `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `call` until it succeeds, fails non-transiently, or attempts run out.
///
/// # Errors
///
/// Returns the last error from `call`.
pub async fn with_retry<T, F, Fut>(
    clock: &impl Clock,
    policy: &RetryPolicy,
    op: &str,
    mut call: F,
) -> CpResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CpResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::info!(
                    op,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient control-plane error, retrying"
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::debug!(op, attempt, error = %err, "control-plane call failed");
                return Err(err);
            }
        }
    }
}
