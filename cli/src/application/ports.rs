//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `wincloud_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::Output;
use std::time::{Duration, Instant};

use anyhow::Result;
use wincloud_common::{InstanceDetails, ManagedInstance, ResourceGroupStatus};

use crate::domain::{ControlPlaneError, KeyMaterial, WincloudConfig};

/// Result of a control-plane call.
pub type CpResult<T> = std::result::Result<T, ControlPlaneError>;

// ── Value Types ───────────────────────────────────────────────────────────────

/// Snapshot of a template-created resource group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupDescription {
    pub id: Option<String>,
    pub status: ResourceGroupStatus,
    /// Provider-supplied reason for the current status, if any.
    pub reason: Option<String>,
    /// Named template outputs (`SubnetId`, `SecurityGroupId`, ...).
    pub outputs: HashMap<String, String>,
    pub tags: HashMap<String, String>,
}

impl ResourceGroupDescription {
    /// Whether the group carries this tool's tags for `name`.
    #[must_use]
    pub fn is_managed_as(&self, name: &str) -> bool {
        let tag = |key: &str| self.tags.get(key).map(String::as_str);
        tag(wincloud_common::TAG_MANAGED_BY) == Some(wincloud_common::MANAGED_BY)
            && tag(wincloud_common::TAG_NAME) == Some(name)
    }
}

/// Parameters for a single create-instance call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec<'a> {
    pub region: &'a str,
    /// Logical name, applied as the `Name` tag.
    pub name: &'a str,
    pub image_id: &'a str,
    pub instance_type: &'a str,
    pub key_name: &'a str,
    pub subnet_id: &'a str,
    pub security_group_id: &'a str,
    pub volume_size_gb: u32,
}

// ── Control-Plane Port Traits ─────────────────────────────────────────────────

/// Template-based resource groups.
#[allow(async_fn_in_trait)]
pub trait ResourceGroups {
    /// Submit `template_body` as a new resource group named `name`; returns its id.
    async fn create_resource_group(
        &self,
        region: &str,
        name: &str,
        template_body: &str,
        parameters: &[(&str, &str)],
    ) -> CpResult<String>;
    /// Describe a resource group by name or id.
    async fn describe_resource_group(
        &self,
        region: &str,
        name_or_id: &str,
    ) -> CpResult<ResourceGroupDescription>;
    /// Request deletion; completion must be observed via `describe_resource_group`.
    async fn delete_resource_group(&self, region: &str, name_or_id: &str) -> CpResult<()>;
}

/// Compute instance primitives.
#[allow(async_fn_in_trait)]
pub trait Instances {
    /// Request a new instance; returns as soon as an id is assigned.
    async fn create_instance(&self, spec: &LaunchSpec<'_>) -> CpResult<String>;
    async fn describe_instance(&self, region: &str, instance_id: &str)
    -> CpResult<InstanceDetails>;
    async fn start_instance(&self, region: &str, instance_id: &str) -> CpResult<()>;
    async fn stop_instance(&self, region: &str, instance_id: &str) -> CpResult<()>;
    async fn terminate_instance(&self, region: &str, instance_id: &str) -> CpResult<()>;
    /// Ids of instances tagged for logical `name` that are not yet terminated.
    async fn find_instances(&self, region: &str, name: &str) -> CpResult<Vec<String>>;
}

/// Boot-time encrypted password material.
#[allow(async_fn_in_trait)]
pub trait PasswordData {
    /// Base64 password blob, or `None` while the instance has not published it.
    async fn get_password_material(
        &self,
        region: &str,
        instance_id: &str,
    ) -> CpResult<Option<String>>;
}

/// Remote key-pair registrations.
#[allow(async_fn_in_trait)]
pub trait KeyPairs {
    /// Register an OpenSSH-format public key under `name`.
    async fn import_key_pair(&self, region: &str, name: &str, public_key: &str) -> CpResult<()>;
    /// The registered OpenSSH public key, or `None` if no pair is named `name`.
    async fn describe_key_pair(&self, region: &str, name: &str) -> CpResult<Option<String>>;
    async fn delete_key_pair(&self, region: &str, name: &str) -> CpResult<()>;
}

/// Every control-plane capability the services need.
pub trait ControlPlane: ResourceGroups + Instances + PasswordData + KeyPairs {}

/// Blanket implementation: any type implementing all four sub-traits is a `ControlPlane`.
impl<T> ControlPlane for T where T: ResourceGroups + Instances + PasswordData + KeyPairs {}

// ── Clock Port ────────────────────────────────────────────────────────────────

/// Time source for poll loops and backoff, so tests can advance time
/// without real waits.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Local State Ports ─────────────────────────────────────────────────────────

/// Persisted name → `ManagedInstance` mapping.
#[allow(async_fn_in_trait)]
pub trait InstanceRecordStore {
    /// All records, keyed by logical name. Empty when nothing is stored yet.
    async fn load_all(&self) -> Result<BTreeMap<String, ManagedInstance>>;
    /// Insert or replace the record for `record.name`.
    async fn save(&self, record: &ManagedInstance) -> Result<()>;
    /// Remove the record for `name`; absent records are not an error.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Find a record by logical name or instance id.
    async fn find(&self, name_or_id: &str) -> Result<Option<ManagedInstance>> {
        let records = self.load_all().await?;
        if let Some(record) = records.get(name_or_id) {
            return Ok(Some(record.clone()));
        }
        Ok(records.into_values().find(|r| r.matches(name_or_id)))
    }
}

/// Local private-key files, keyed by key-pair name.
#[allow(async_fn_in_trait)]
pub trait KeyMaterialStore {
    async fn exists(&self, key_name: &str) -> Result<bool>;
    async fn read(&self, key_name: &str) -> Result<Option<KeyMaterial>>;
    /// Persist a new key with owner-only permissions. Never overwrites.
    async fn write(&self, key: &KeyMaterial) -> Result<()>;
    /// Remove the key file; returns `false` if it was already absent.
    async fn remove(&self, key_name: &str) -> Result<bool>;
}

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when no file exists.
    fn load(&self) -> Result<WincloudConfig>;
    fn save(&self, config: &WincloudConfig) -> Result<()>;
    /// Location of the configuration file.
    fn path(&self) -> Result<PathBuf>;
}
