//! Waits for a launched instance to boot and publish its password material.

use wincloud_common::{InstanceDetails, InstanceState};

use crate::application::ports::{Clock, ControlPlane};
use crate::application::services::Remote;
use crate::application::services::poll::{
    PollError, PollPolicy, Check, poll_until, transient_as_pending,
};
use crate::domain::{ControlPlaneError, ProvisionError};

/// Poll until the instance reports `running`.
///
/// `pending` keeps waiting. Any shutdown or stopped state is fatal.
///
/// # Errors
///
/// `InstanceFailed` on a fatal state; `BootTimeout` at the deadline.
pub async fn await_running(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    policy: &PollPolicy,
    region: &str,
    instance_id: &str,
) -> Result<InstanceDetails, ProvisionError> {
    let result = poll_until(remote.clock, policy, "instance boot", || async {
        let described = remote
            .call("describe-instances", || {
                remote.cp.describe_instance(region, instance_id)
            })
            .await;
        let check = match described {
            Ok(details) => match details.state {
                Some(InstanceState::Running) => Ok(Check::Ready(details)),
                Some(InstanceState::Pending) => Ok(Check::Pending("pending".into())),
                None => Ok(Check::Pending("unknown".into())),
                Some(state) => {
                    return Err(ProvisionError::InstanceFailed {
                        instance_id: instance_id.to_string(),
                        state: state.to_string(),
                    });
                }
            },
            // New instance ids are eventually consistent.
            Err(ControlPlaneError::NotFound(_)) => Ok(Check::Pending("not yet visible".into())),
            Err(e) => Err(e),
        };
        transient_as_pending(check).map_err(ProvisionError::from)
    })
    .await;

    match result {
        Ok(details) => {
            tracing::info!(instance_id, "instance running");
            Ok(details)
        }
        Err(PollError::Failed(e)) => Err(e),
        Err(PollError::TimedOut { waited, .. }) => Err(ProvisionError::BootTimeout {
            instance_id: instance_id.to_string(),
            waited,
        }),
    }
}

/// Poll until the encrypted password blob is published.
///
/// Absent material is normal for several minutes after boot and never
/// fails the wait before the deadline.
///
/// # Errors
///
/// `PasswordMaterialTimeout` at the deadline; non-transient control-plane
/// errors immediately.
pub async fn await_password_material(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    policy: &PollPolicy,
    region: &str,
    instance_id: &str,
) -> Result<String, ProvisionError> {
    let result = poll_until(remote.clock, policy, "password material", || async {
        let fetched = remote
            .call("get-password-data", || {
                remote.cp.get_password_material(region, instance_id)
            })
            .await;
        let check = match fetched {
            Ok(Some(blob)) if !blob.trim().is_empty() => Ok(Check::Ready(blob)),
            Ok(_) => Ok(Check::Pending("not yet available".into())),
            Err(e) => Err(e),
        };
        transient_as_pending(check).map_err(ProvisionError::from)
    })
    .await;

    match result {
        Ok(blob) => {
            tracing::info!(instance_id, "password material available");
            Ok(blob)
        }
        Err(PollError::Failed(e)) => Err(e),
        Err(PollError::TimedOut { waited, .. }) => Err(ProvisionError::PasswordMaterialTimeout {
            instance_id: instance_id.to_string(),
            waited,
        }),
    }
}
