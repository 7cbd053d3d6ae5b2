//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod credential;
pub mod error;
pub mod provisioning;
pub mod teardown;

pub use config::{WincloudConfig, validate_config_key, validate_config_value};
pub use credential::{KeyMaterial, decrypt_password};
pub use error::{ConfigError, ControlPlaneError, ErrorCategory, ProvisionError};
pub use provisioning::{
    CreateOverrides, CreateRequest, CreatedResources, ProvisionOutcome, ProvisionPhase,
    ProvisionStep, ProvisioningState,
};
pub use teardown::{StepResult, TeardownReport, TeardownState, TeardownStep};
