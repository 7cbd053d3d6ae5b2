//! Single create-instance call inside a ready resource group.

use crate::application::ports::{Clock, ControlPlane, LaunchSpec};
use crate::application::services::Remote;
use crate::application::services::template::{
    OUTPUT_SECURITY_GROUP_ID, OUTPUT_SUBNET_ID, ResourceGroupHandle,
};
use crate::domain::{ControlPlaneError, CreateRequest, ProvisionError};

/// Launch the instance and return its id without waiting for boot.
///
/// # Errors
///
/// `MissingOutput` if the group lacks network outputs; `Capacity` and
/// `InvalidSpec` passed through from the control plane, never retried.
pub async fn launch(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    group: &ResourceGroupHandle,
    request: &CreateRequest,
    key_name: &str,
) -> Result<String, ProvisionError> {
    let spec = LaunchSpec {
        region: &request.region,
        name: &request.name,
        image_id: &request.image_id,
        instance_type: &request.instance_type,
        key_name,
        subnet_id: group.output(OUTPUT_SUBNET_ID)?,
        security_group_id: group.output(OUTPUT_SECURITY_GROUP_ID)?,
        volume_size_gb: request.volume_size_gb,
    };
    let instance_id = remote
        .call("run-instances", || remote.cp.create_instance(&spec))
        .await
        .map_err(|e| match e {
            ControlPlaneError::Capacity(msg) => ProvisionError::Capacity(msg),
            ControlPlaneError::InvalidSpec(msg) => ProvisionError::InvalidSpec(msg),
            other => ProvisionError::ControlPlane(other),
        })?;
    tracing::info!(name = %request.name, instance_id = %instance_id, "instance launched");
    Ok(instance_id)
}
