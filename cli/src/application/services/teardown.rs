//! Ordered teardown of everything one instance owns.
//!
//! Instance first, then its resource group (the provider refuses to delete
//! network resources under a live instance), then the key pair. The key
//! pair is always attempted. Every step re-reads remote state, so a run
//! interrupted at any point can simply be repeated.

use wincloud_common::{InstanceState, LifecycleState, ManagedInstance, ResourceGroupStatus};

use crate::application::ports::{Clock, ControlPlane, InstanceRecordStore, KeyMaterialStore};
use crate::application::services::Remote;
use crate::application::services::keystore;
use crate::application::services::poll::{PollError, PollPolicy, Check, poll_until, transient_as_pending};
use crate::domain::{
    ControlPlaneError, CreatedResources, ProvisionError, StepResult, TeardownReport, TeardownStep,
};

/// Remote resources to delete. A `None` resource group or key pair was never
/// created; a `None` instance id means none was recorded, so instances are
/// looked up by their tags instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownTargets {
    pub name: String,
    pub region: String,
    pub instance_id: Option<String>,
    pub resource_group: Option<String>,
    pub key_name: Option<String>,
}

impl TeardownTargets {
    #[must_use]
    pub fn from_record(record: &ManagedInstance) -> Self {
        Self {
            name: record.name.clone(),
            region: record.region.clone(),
            instance_id: record.instance_id.clone(),
            resource_group: Some(record.resource_group.clone()),
            key_name: Some(record.key_name.clone()),
        }
    }

    /// Only what a failed `create` actually allocated.
    #[must_use]
    pub fn from_created(name: &str, region: &str, created: &CreatedResources) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            instance_id: created.instance_id.clone(),
            resource_group: created
                .resource_group_id
                .clone()
                .or_else(|| created.resource_group.clone()),
            key_name: created.key_name.clone(),
        }
    }

    /// Deterministic names for a logical name with no record left.
    #[must_use]
    pub fn derived(name: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            instance_id: None,
            resource_group: Some(wincloud_common::resource_group_name(name)),
            key_name: Some(wincloud_common::key_pair_name(name)),
        }
    }
}

/// Resolve `name_or_id` and tear it down. The record is removed only when
/// every step succeeded; otherwise it is kept in `terminating` for a retry.
///
/// With no record, a valid logical name is re-resolved by its deterministic
/// remote names in `fallback_region`, so repeating a finished teardown
/// reports success.
///
/// # Errors
///
/// `UnknownInstance` if nothing can be resolved; `LocalState` if the record
/// store fails. Step failures are reported in the returned report.
pub async fn terminate(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    keys: &impl KeyMaterialStore,
    policy: &PollPolicy,
    name_or_id: &str,
    fallback_region: Option<&str>,
) -> Result<TeardownReport, ProvisionError> {
    tracing::debug!(target_name = name_or_id, step = ?TeardownStep::Resolving, "teardown");
    let found = records
        .find(name_or_id)
        .await
        .map_err(|e| ProvisionError::local(&e))?;

    let Some(mut record) = found else {
        let region = fallback_region
            .filter(|_| wincloud_common::validate_instance_name(name_or_id).is_ok())
            .ok_or_else(|| ProvisionError::UnknownInstance(name_or_id.to_string()))?;
        tracing::info!(name = name_or_id, region, "no record, re-resolving by derived names");
        return Ok(run(remote, keys, policy, &TeardownTargets::derived(name_or_id, region)).await);
    };

    if record.state != LifecycleState::Terminating {
        record.state = LifecycleState::Terminating;
        records
            .save(&record)
            .await
            .map_err(|e| ProvisionError::local(&e))?;
    }

    let report = run(remote, keys, policy, &TeardownTargets::from_record(&record)).await;
    if report.is_complete() {
        records
            .remove(&record.name)
            .await
            .map_err(|e| ProvisionError::local(&e))?;
    }
    Ok(report)
}

/// Run every teardown step against `targets` and report each outcome.
pub async fn run(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    keys: &impl KeyMaterialStore,
    policy: &PollPolicy,
    targets: &TeardownTargets,
) -> TeardownReport {
    let mut report = TeardownReport::new(&targets.name);
    let region = targets.region.as_str();

    let instance = match targets.instance_id.as_deref() {
        None => delete_untracked_instances(remote, policy, region, &targets.name).await,
        Some(id) => delete_instance(remote, policy, region, id).await,
    };
    log_step(&targets.name, TeardownStep::DeletingInstance, &instance);
    let instance_gone = instance.is_ok();
    report.record(TeardownStep::DeletingInstance, instance);

    let group = match targets.resource_group.as_deref() {
        _ if !instance_gone => StepResult::Skipped("instance not confirmed deleted".into()),
        None => StepResult::AlreadyGone,
        Some(group) => delete_resource_group(remote, policy, region, group).await,
    };
    log_step(&targets.name, TeardownStep::DeletingResourceGroup, &group);
    report.record(TeardownStep::DeletingResourceGroup, group);

    let key = match targets.key_name.as_deref() {
        None => StepResult::AlreadyGone,
        Some(key_name) => match keystore::delete(remote, keys, region, key_name).await {
            Ok(true) => StepResult::Deleted,
            Ok(false) => StepResult::AlreadyGone,
            Err(e) => StepResult::Failed(e.to_string()),
        },
    };
    log_step(&targets.name, TeardownStep::DeletingKeyPair, &key);
    report.record(TeardownStep::DeletingKeyPair, key);

    if report.is_complete() {
        tracing::info!(name = %targets.name, step = ?TeardownStep::Done, "teardown complete");
    }
    report
}

fn log_step(name: &str, step: TeardownStep, result: &StepResult) {
    if result.is_ok() {
        tracing::info!(name, ?step, ?result, "teardown step finished");
    } else {
        tracing::warn!(name, ?step, ?result, "teardown step did not finish");
    }
}

/// A create interrupted between launch and saving the record leaves an
/// instance only its tags identify.
async fn delete_untracked_instances(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    policy: &PollPolicy,
    region: &str,
    name: &str,
) -> StepResult {
    let found = match remote
        .call("find-instances", || remote.cp.find_instances(region, name))
        .await
    {
        Ok(found) => found,
        Err(e) => return StepResult::Failed(e.to_string()),
    };
    let mut result = StepResult::AlreadyGone;
    for id in &found {
        tracing::info!(name, instance_id = %id, "found untracked instance");
        match delete_instance(remote, policy, region, id).await {
            StepResult::AlreadyGone => {}
            StepResult::Deleted => result = StepResult::Deleted,
            unfinished => return unfinished,
        }
    }
    result
}

async fn delete_instance(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    policy: &PollPolicy,
    region: &str,
    instance_id: &str,
) -> StepResult {
    let describe = || async {
        remote
            .call("describe-instances", || {
                remote.cp.describe_instance(region, instance_id)
            })
            .await
            .map(|d| d.state)
    };

    match describe().await {
        Ok(Some(InstanceState::Terminated)) | Err(ControlPlaneError::NotFound(_)) => {
            return StepResult::AlreadyGone;
        }
        Ok(_) => {}
        Err(e) => return StepResult::Failed(e.to_string()),
    }

    match remote
        .call("terminate-instances", || {
            remote.cp.terminate_instance(region, instance_id)
        })
        .await
    {
        Ok(()) => {}
        Err(ControlPlaneError::NotFound(_)) => return StepResult::AlreadyGone,
        Err(e) => return StepResult::Failed(e.to_string()),
    }

    let waited = poll_until(remote.clock, policy, "instance termination", || async {
        let check = match describe().await {
            Ok(Some(InstanceState::Terminated)) | Err(ControlPlaneError::NotFound(_)) => {
                Ok(Check::Ready(()))
            }
            Ok(state) => Ok(Check::Pending(
                state.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
            )),
            Err(e) => Err(e),
        };
        transient_as_pending(check)
    })
    .await;

    match waited {
        Ok(()) => StepResult::Deleted,
        Err(PollError::Failed(e)) => StepResult::Failed(e.to_string()),
        Err(PollError::TimedOut {
            last_status,
            waited,
        }) => StepResult::Failed(format!(
            "instance {instance_id} still {} after {}s",
            last_status.unwrap_or_else(|| "shutting-down".into()),
            waited.as_secs()
        )),
    }
}

async fn delete_resource_group(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    policy: &PollPolicy,
    region: &str,
    group: &str,
) -> StepResult {
    let describe = || async {
        remote
            .call("describe-stacks", || {
                remote.cp.describe_resource_group(region, group)
            })
            .await
    };

    match describe().await {
        Ok(g) if g.status == ResourceGroupStatus::Deleted => return StepResult::AlreadyGone,
        Err(ControlPlaneError::NotFound(_)) => return StepResult::AlreadyGone,
        Ok(_) => {}
        Err(e) => return StepResult::Failed(e.to_string()),
    }

    if let Err(e) = remote
        .call("delete-stack", || remote.cp.delete_resource_group(region, group))
        .await
    {
        return match e {
            ControlPlaneError::NotFound(_) => StepResult::AlreadyGone,
            e => StepResult::Failed(e.to_string()),
        };
    }

    let waited = poll_until(remote.clock, policy, "resource group deletion", || async {
        let check = match describe().await {
            Ok(g) => match g.status {
                ResourceGroupStatus::Deleted => Ok(Check::Ready(())),
                ResourceGroupStatus::DeleteFailed => {
                    return Err(PollFailure::Rejected(
                        g.reason.unwrap_or_else(|| "delete failed".into()),
                    ));
                }
                status => Ok(Check::Pending(format!("{status:?}"))),
            },
            Err(ControlPlaneError::NotFound(_)) => Ok(Check::Ready(())),
            Err(e) => Err(e),
        };
        transient_as_pending(check).map_err(PollFailure::ControlPlane)
    })
    .await;

    match waited {
        Ok(()) => StepResult::Deleted,
        Err(PollError::Failed(PollFailure::Rejected(reason))) => {
            StepResult::Failed(format!("resource group {group} failed to delete: {reason}"))
        }
        Err(PollError::Failed(PollFailure::ControlPlane(e))) => StepResult::Failed(e.to_string()),
        Err(PollError::TimedOut { waited, .. }) => StepResult::Failed(format!(
            "resource group {group} still deleting after {}s",
            waited.as_secs()
        )),
    }
}

enum PollFailure {
    Rejected(String),
    ControlPlane(ControlPlaneError),
}
