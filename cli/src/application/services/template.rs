//! Resource-group submission and readiness polling.
//!
//! Submission and waiting are separate calls so the caller can record the
//! group id before the (long) wait starts. No cleanup happens here.

use std::cell::Cell;
use std::collections::HashMap;

use wincloud_common::ResourceGroupStatus;

use crate::application::ports::{Clock, ControlPlane};
use crate::application::services::Remote;
use crate::application::services::poll::{PollError, PollPolicy, Check, poll_until, transient_as_pending};
use crate::domain::{ControlPlaneError, ProvisionError};

pub const OUTPUT_SUBNET_ID: &str = "SubnetId";
pub const OUTPUT_SECURITY_GROUP_ID: &str = "SecurityGroupId";
/// Template parameter restricting inbound RDP.
pub const PARAM_RDP_SOURCE_CIDR: &str = "RDPSourceCIDR";

/// A created resource group and its named outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupHandle {
    pub name: String,
    pub id: String,
    pub outputs: HashMap<String, String>,
}

impl ResourceGroupHandle {
    /// Look up a template output by name.
    ///
    /// # Errors
    ///
    /// `MissingOutput` if the template did not produce `key`.
    pub fn output(&self, key: &str) -> Result<&str, ProvisionError> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ProvisionError::MissingOutput(key.to_string()))
    }
}

/// Submit the template as resource group `name`; returns the group id.
///
/// A duplicate reported after a transient failure may be this call's own
/// earlier attempt. That group is adopted when it carries our tags for
/// `name`.
///
/// # Errors
///
/// `ResourceGroupExists` if a group with that name already exists; other
/// control-plane errors verbatim.
pub async fn submit(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    region: &str,
    name: &str,
    template_body: &str,
    parameters: &[(&str, &str)],
) -> Result<String, ProvisionError> {
    let interrupted = Cell::new(false);
    let created = remote
        .call("create-stack", || async {
            let result = remote
                .cp
                .create_resource_group(region, name, template_body, parameters)
                .await;
            if result.as_ref().is_err_and(ControlPlaneError::is_transient) {
                interrupted.set(true);
            }
            result
        })
        .await;
    let id = match created {
        Ok(id) => id,
        Err(ControlPlaneError::AlreadyExists(_)) if interrupted.get() => {
            adopt(remote, region, name).await?
        }
        Err(ControlPlaneError::AlreadyExists(_)) => {
            return Err(ProvisionError::ResourceGroupExists {
                name: name.to_string(),
            });
        }
        Err(ControlPlaneError::InvalidSpec(msg)) => return Err(ProvisionError::InvalidSpec(msg)),
        Err(other) => return Err(ProvisionError::ControlPlane(other)),
    };
    tracing::info!(resource_group = name, id = %id, "template submitted");
    Ok(id)
}

async fn adopt(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    region: &str,
    name: &str,
) -> Result<String, ProvisionError> {
    let group = remote
        .call("describe-stacks", || {
            remote.cp.describe_resource_group(region, name)
        })
        .await?;
    if !group.is_managed_as(name) {
        return Err(ProvisionError::ResourceGroupExists {
            name: name.to_string(),
        });
    }
    tracing::info!(resource_group = name, "adopting group created by an interrupted attempt");
    Ok(group.id.unwrap_or_else(|| name.to_string()))
}

/// Poll until the group is created or failed.
///
/// # Errors
///
/// `ResourceGroupFailed` with the provider's reason; `ProvisioningTimeout`
/// when still in progress at the deadline.
pub async fn await_ready(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    policy: &PollPolicy,
    region: &str,
    name: &str,
) -> Result<ResourceGroupHandle, ProvisionError> {
    let result = poll_until(remote.clock, policy, "resource group", || async {
        let described = remote
            .call("describe-stacks", || {
                remote.cp.describe_resource_group(region, name)
            })
            .await;
        let check = match described {
            Ok(group) => match group.status {
                ResourceGroupStatus::Created => Ok(Check::Ready(ResourceGroupHandle {
                    name: name.to_string(),
                    id: group.id.unwrap_or_else(|| name.to_string()),
                    outputs: group.outputs,
                })),
                ResourceGroupStatus::InProgress => Ok(Check::Pending("in-progress".into())),
                status => {
                    return Err(ProvisionError::ResourceGroupFailed {
                        name: name.to_string(),
                        reason: group
                            .reason
                            .unwrap_or_else(|| format!("status {status:?}")),
                    });
                }
            },
            // Freshly created groups can lag behind in describe results.
            Err(ControlPlaneError::NotFound(_)) => Ok(Check::Pending("not yet visible".into())),
            Err(e) => Err(e),
        };
        transient_as_pending(check).map_err(ProvisionError::from)
    })
    .await;

    match result {
        Ok(handle) => {
            tracing::info!(resource_group = name, "resource group ready");
            Ok(handle)
        }
        Err(PollError::Failed(e)) => Err(e),
        Err(PollError::TimedOut { waited, .. }) => Err(ProvisionError::ProvisioningTimeout {
            name: name.to_string(),
            waited,
        }),
    }
}
