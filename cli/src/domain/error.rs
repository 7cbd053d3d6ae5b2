//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

// ── Control-plane errors ──────────────────────────────────────────────────────

/// A failed control-plane call, classified by what the caller may do next.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlPlaneError {
    #[error("control plane unreachable: {0}")]
    Transient(String),

    #[error("insufficient capacity: {0}")]
    Capacity(String),

    #[error("invalid request: {0}")]
    InvalidSpec(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("control plane error: {0}")]
    Other(String),
}

impl ControlPlaneError {
    /// Only transient failures are worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Broad failure classes. Decides retry policy and the user-facing error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or throttling failure; retried with backoff.
    TransientNetwork,
    /// The control plane refused the request; never retried.
    ControlPlaneRejected,
    /// A poll exceeded its deadline; resumable.
    Timeout,
    /// Local key file or record missing or unreadable.
    LocalState,
}

impl ErrorCategory {
    /// Stable machine code used in `--json` error objects.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::ControlPlaneRejected => "control_plane_rejected",
            Self::Timeout => "timeout",
            Self::LocalState => "local_state",
        }
    }
}

/// Failures raised by the provisioning, lifecycle and teardown components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("a key for '{name}' already exists; remove it manually or choose another name")]
    KeyConflict { name: String },

    #[error("no local key for '{name}'; the password cannot be decrypted without it")]
    KeyNotFound { name: String },

    #[error("resource group '{name}' already exists")]
    ResourceGroupExists { name: String },

    #[error("resource group '{name}' failed: {reason}")]
    ResourceGroupFailed { name: String, reason: String },

    #[error("resource group '{name}' still in progress after {}s", .waited.as_secs())]
    ProvisioningTimeout { name: String, waited: Duration },

    #[error("resource group output '{0}' is missing")]
    MissingOutput(String),

    #[error("insufficient capacity: {0}")]
    Capacity(String),

    #[error("invalid instance spec: {0}")]
    InvalidSpec(String),

    #[error("instance {instance_id} not running after {}s", .waited.as_secs())]
    BootTimeout { instance_id: String, waited: Duration },

    #[error("instance {instance_id} entered state '{state}' while booting")]
    InstanceFailed { instance_id: String, state: String },

    #[error("password for {instance_id} not available after {}s; retry later", .waited.as_secs())]
    PasswordMaterialTimeout { instance_id: String, waited: Duration },

    #[error("cannot decrypt password: {0}")]
    Decryption(String),

    #[error("cannot {operation} instance {instance_id} while it is {state}")]
    InvalidStateTransition {
        instance_id: String,
        operation: &'static str,
        state: String,
    },

    #[error("unknown instance '{0}'. Run 'wincloud list' to see managed instances.")]
    UnknownInstance(String),

    #[error("an instance named '{0}' is already managed. Terminate it first or choose another name.")]
    AlreadyManaged(String),

    #[error(transparent)]
    InvalidName(#[from] wincloud_common::InvalidName),

    #[error("local state error: {0}")]
    LocalState(String),

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}

impl ProvisionError {
    /// Wrap a local I/O failure, keeping the full context chain.
    #[must_use]
    pub fn local(err: &anyhow::Error) -> Self {
        Self::LocalState(format!("{err:#}"))
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProvisioningTimeout { .. }
            | Self::BootTimeout { .. }
            | Self::PasswordMaterialTimeout { .. } => ErrorCategory::Timeout,
            Self::KeyConflict { .. }
            | Self::KeyNotFound { .. }
            | Self::UnknownInstance(_)
            | Self::AlreadyManaged(_)
            | Self::LocalState(_)
            | Self::Decryption(_) => ErrorCategory::LocalState,
            Self::ControlPlane(e) if e.is_transient() => ErrorCategory::TransientNetwork,
            _ => ErrorCategory::ControlPlaneRejected,
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\n{expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
