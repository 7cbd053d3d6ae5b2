//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

use std::future::Future;

use crate::application::ports::{Clock, ControlPlane, CpResult};

pub mod boot;
pub mod config_service;
pub mod inventory;
pub mod keystore;
pub mod launcher;
pub mod lifecycle;
pub mod password;
pub mod poll;
pub mod provision;
pub mod retry;
pub mod teardown;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

use retry::RetryPolicy;

/// A control plane plus the clock and retry policy every call goes through.
pub struct Remote<'a, C, T> {
    pub cp: &'a C,
    pub clock: &'a T,
    pub retry: RetryPolicy,
}

impl<'a, C: ControlPlane, T: Clock> Remote<'a, C, T> {
    #[must_use]
    pub fn new(cp: &'a C, clock: &'a T, retry: RetryPolicy) -> Self {
        Self { cp, clock, retry }
    }

    /// Run one control-plane call with transient-error retry.
    ///
    /// # Errors
    ///
    /// Returns the call's last error.
    pub async fn call<X, F, Fut>(&self, op: &str, call: F) -> CpResult<X>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CpResult<X>>,
    {
        retry::with_retry(self.clock, &self.retry, op, call).await
    }
}
