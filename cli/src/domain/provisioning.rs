//! Create-workflow types: the immutable request, in-flight progress, and the
//! final outcome.

use serde::Serialize;

use crate::domain::config::{WincloudConfig, validate_config_value};
use crate::domain::error::ProvisionError;
use crate::domain::teardown::TeardownReport;

/// Everything `create` needs, gathered up front and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRequest {
    pub name: String,
    pub region: String,
    pub instance_type: String,
    pub image_id: String,
    pub volume_size_gb: u32,
    pub rdp_cidr: String,
    pub skip_password: bool,
}

/// Flag values for `create`; `None` falls back to configuration.
#[derive(Debug, Clone, Default)]
pub struct CreateOverrides {
    pub name: String,
    pub region: Option<String>,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub volume_size_gb: Option<u32>,
    pub rdp_cidr: Option<String>,
    pub skip_password: bool,
}

impl CreateRequest {
    /// Layer flag values over configured defaults and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, no region or image is known,
    /// or a flag value fails validation.
    pub fn resolve(flags: CreateOverrides, config: &WincloudConfig) -> anyhow::Result<Self> {
        wincloud_common::validate_instance_name(&flags.name)?;
        let defaults = &config.defaults;

        let region = flags.region.or_else(|| defaults.region.clone()).ok_or_else(|| {
            anyhow::anyhow!(
                "no region given\n\nPass --region or run: wincloud config set defaults.region <region>"
            )
        })?;
        validate_config_value("defaults.region", &region)?;

        let image_id = flags
            .image_id
            .or_else(|| defaults.image_id.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no image id given\n\nPass --ami or run: wincloud config set defaults.image_id <ami-id>"
                )
            })?;
        validate_config_value("defaults.image_id", &image_id)?;

        let rdp_cidr = flags.rdp_cidr.unwrap_or_else(|| defaults.rdp_cidr.clone());
        validate_config_value("defaults.rdp_cidr", &rdp_cidr)?;

        let volume_size_gb = flags.volume_size_gb.unwrap_or(defaults.volume_size_gb);
        anyhow::ensure!(volume_size_gb > 0, "volume size must be positive");

        Ok(Self {
            name: flags.name,
            region,
            instance_type: flags
                .instance_type
                .unwrap_or_else(|| defaults.instance_type.clone()),
            image_id,
            volume_size_gb,
            rdp_cidr,
            skip_password: flags.skip_password,
        })
    }
}

/// Sub-steps of `create` that may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    KeyRegistered,
    TemplateSubmitted,
    TemplateReady,
    InstanceLaunched,
    InstanceRunning,
    PasswordMaterialAvailable,
    PasswordDecrypted,
}

/// Coarse position of the orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    Init,
    TemplateSubmitted,
    InstanceLaunched,
    InstanceRunning,
    PasswordRetrieved,
    Complete,
}

impl std::fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::TemplateSubmitted => "template-submitted",
            Self::InstanceLaunched => "instance-launched",
            Self::InstanceRunning => "instance-running",
            Self::PasswordRetrieved => "password-retrieved",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Remote identifiers allocated so far. Reported on every failure so the
/// user knows what exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatedResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl CreatedResources {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_name.is_none()
            && self.resource_group.is_none()
            && self.resource_group_id.is_none()
            && self.instance_id.is_none()
    }
}

/// In-memory progress of one `create` invocation.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningState {
    completed: Vec<ProvisionStep>,
    pub created: CreatedResources,
}

impl ProvisioningState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&mut self, step: ProvisionStep) {
        if !self.completed.contains(&step) {
            self.completed.push(step);
        }
    }

    #[must_use]
    pub fn has(&self, step: ProvisionStep) -> bool {
        self.completed.contains(&step)
    }

    #[must_use]
    pub fn completed(&self) -> &[ProvisionStep] {
        &self.completed
    }

    /// Phase implied by the furthest completed step.
    #[must_use]
    pub fn phase(&self) -> ProvisionPhase {
        if self.has(ProvisionStep::PasswordDecrypted) {
            ProvisionPhase::PasswordRetrieved
        } else if self.has(ProvisionStep::InstanceRunning) {
            ProvisionPhase::InstanceRunning
        } else if self.has(ProvisionStep::InstanceLaunched) {
            ProvisionPhase::InstanceLaunched
        } else if self.has(ProvisionStep::TemplateSubmitted) {
            ProvisionPhase::TemplateSubmitted
        } else {
            ProvisionPhase::Init
        }
    }

    /// Failures before the instance is confirmed running are rolled back.
    #[must_use]
    pub fn should_roll_back(&self) -> bool {
        self.phase() < ProvisionPhase::InstanceRunning
    }
}

/// Terminal result of the create state machine.
#[derive(Debug)]
pub enum ProvisionOutcome {
    Complete {
        name: String,
        instance_id: String,
        resource_group_id: String,
        key_name: String,
        password: String,
    },
    /// `--skip-password`: stopped after the launch was accepted.
    Launched {
        name: String,
        instance_id: String,
        resource_group_id: String,
        key_name: String,
    },
    RolledBack {
        name: String,
        error: ProvisionError,
        created: CreatedResources,
        cleanup: TeardownReport,
    },
    PartialFailure {
        name: String,
        error: ProvisionError,
        created: CreatedResources,
    },
}

impl ProvisionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Launched { .. })
    }
}
