//! Standalone password retrieval for an already-launched instance.

use serde::Serialize;
use wincloud_common::LifecycleState;

use crate::application::ports::{Clock, ControlPlane, InstanceRecordStore, KeyMaterialStore};
use crate::application::services::Remote;
use crate::application::services::inventory::{launched_id, resolve};
use crate::application::services::poll::PollPolicy;
use crate::application::services::{boot, keystore};
use crate::domain::{ProvisionError, decrypt_password};

/// Administrator account every Windows image ships with.
pub const ADMIN_USERNAME: &str = "Administrator";

/// Default RDP port.
pub const RDP_PORT: u16 = 3389;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedPassword {
    pub name: String,
    pub instance_id: String,
    pub username: &'static str,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

/// Wait for and decrypt the administrator password of `name_or_id`.
///
/// The local key is loaded before any remote call, so a missing key fails
/// fast instead of after the wait.
///
/// # Errors
///
/// `UnknownInstance`, `KeyNotFound`, `PasswordMaterialTimeout`, or
/// `Decryption` if the material does not belong to the local key.
pub async fn retrieve(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    keys: &impl KeyMaterialStore,
    policy: &PollPolicy,
    name_or_id: &str,
) -> Result<RetrievedPassword, ProvisionError> {
    let mut record = resolve(records, name_or_id).await?;
    let instance_id = launched_id(&record, "password")?.to_string();
    let material = keystore::load(keys, &record.key_name).await?;

    let blob = boot::await_password_material(remote, policy, &record.region, &instance_id).await?;
    let password = decrypt_password(&blob, &material)?;

    // Address is informational; a failed describe still returns the password.
    let public_ip = match remote
        .call("describe-instances", || {
            remote.cp.describe_instance(&record.region, &instance_id)
        })
        .await
    {
        Ok(details) => details.public_ip,
        Err(err) => {
            tracing::debug!(instance_id = %instance_id, error = %err, "no address for password output");
            None
        }
    };

    if record.state == LifecycleState::Provisioning {
        record.state = LifecycleState::Running;
        if let Err(err) = records.save(&record).await {
            tracing::warn!(name = %record.name, error = %err, "could not update record");
        }
    }

    Ok(RetrievedPassword {
        name: record.name,
        instance_id,
        username: ADMIN_USERNAME,
        password,
        public_ip,
    })
}
