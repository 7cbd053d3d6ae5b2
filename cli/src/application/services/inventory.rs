//! Record resolution plus the read-only `list` and `status` use-cases.
//!
//! Ownership comes from the local records; live state is re-queried on every
//! call and never cached.

use wincloud_common::{
    InstanceStatus, InstanceSummary, LifecycleState, ManagedInstance,
};

use crate::application::ports::{Clock, ControlPlane, InstanceRecordStore};
use crate::application::services::Remote;
use crate::domain::{ControlPlaneError, ProvisionError};

/// Look up the record for a logical name or instance id.
///
/// # Errors
///
/// `UnknownInstance` if no record matches; `LocalState` if records cannot be read.
pub async fn resolve(
    records: &impl InstanceRecordStore,
    name_or_id: &str,
) -> Result<ManagedInstance, ProvisionError> {
    records
        .find(name_or_id)
        .await
        .map_err(|e| ProvisionError::local(&e))?
        .ok_or_else(|| ProvisionError::UnknownInstance(name_or_id.to_string()))
}

/// Instance id of a record, failing if the launch never got that far.
///
/// # Errors
///
/// `InvalidStateTransition` when the record has no instance id yet.
pub fn launched_id<'r>(
    record: &'r ManagedInstance,
    operation: &'static str,
) -> Result<&'r str, ProvisionError> {
    record
        .instance_id
        .as_deref()
        .ok_or_else(|| ProvisionError::InvalidStateTransition {
            instance_id: record.name.clone(),
            operation,
            state: record.state.to_string(),
        })
}

/// Live state of one instance.
///
/// # Errors
///
/// `UnknownInstance` for unknown names; non-transient control-plane errors.
pub async fn status(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    name_or_id: &str,
) -> Result<InstanceStatus, ProvisionError> {
    let record = resolve(records, name_or_id).await?;
    live_status(remote, record).await
}

async fn live_status(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    record: ManagedInstance,
) -> Result<InstanceStatus, ProvisionError> {
    let (state, details) = match record.instance_id.as_deref() {
        None => (record.state, None),
        Some(id) => match remote
            .call("describe-instances", || {
                remote.cp.describe_instance(&record.region, id)
            })
            .await
        {
            Ok(details) => (
                details
                    .state
                    .map_or(record.state, wincloud_common::InstanceState::lifecycle),
                Some(details),
            ),
            Err(ControlPlaneError::NotFound(_)) => (LifecycleState::Terminated, None),
            Err(e) => return Err(e.into()),
        },
    };
    Ok(InstanceStatus {
        name: record.name,
        instance_id: record.instance_id,
        region: record.region,
        resource_group: record.resource_group,
        key_name: record.key_name,
        state,
        details,
    })
}

/// Every managed instance, optionally restricted to one region, with live
/// state. A describe failure for one record shows its recorded state rather
/// than failing the whole listing.
///
/// # Errors
///
/// `LocalState` if records cannot be read.
pub async fn list(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    region: Option<&str>,
) -> Result<Vec<InstanceSummary>, ProvisionError> {
    let all = records
        .load_all()
        .await
        .map_err(|e| ProvisionError::local(&e))?;
    let mut summaries = Vec::with_capacity(all.len());
    for record in all.into_values() {
        if region.is_some_and(|r| r != record.region) {
            continue;
        }
        let recorded = record.state;
        let instance_type = record.instance_type.clone();
        let status = match live_status(remote, record.clone()).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(name = %record.name, error = %err, "cannot describe instance");
                InstanceStatus {
                    name: record.name,
                    instance_id: record.instance_id,
                    region: record.region,
                    resource_group: record.resource_group,
                    key_name: record.key_name,
                    state: recorded,
                    details: None,
                }
            }
        };
        let details = status.details.unwrap_or_default();
        summaries.push(InstanceSummary {
            name: status.name,
            instance_id: status.instance_id,
            region: status.region,
            instance_type: details.instance_type.or(instance_type),
            state: status.state,
            public_ip: details.public_ip,
        });
    }
    Ok(summaries)
}
