//! The `create` state machine.
//!
//! Steps run strictly in order: key pair, resource group, instance, boot,
//! password. Every allocated id is written to `ProvisioningState::created`
//! and to the local record as soon as it is known. A failure before the
//! instance is confirmed running tears down exactly what was allocated; a
//! later failure keeps everything and reports it.

use chrono::Utc;
use wincloud_common::{LifecycleState, ManagedInstance};

use crate::application::ports::{
    Clock, ControlPlane, InstanceRecordStore, KeyMaterialStore, ProgressReporter,
};
use crate::application::services::Remote;
use crate::application::services::poll::PollPolicies;
use crate::application::services::teardown::{self, TeardownTargets};
use crate::application::services::template::PARAM_RDP_SOURCE_CIDR;
use crate::application::services::{boot, keystore, launcher, template};
use crate::domain::{
    CreateRequest, CreatedResources, ProvisionError, ProvisionOutcome, ProvisionStep,
    ProvisioningState, TeardownReport, decrypt_password,
};

/// Inputs to `provision` that come from configuration rather than flags.
#[derive(Debug, Clone)]
pub struct ProvisionSettings<'a> {
    pub template_body: &'a str,
    pub key_bits: usize,
    pub polls: PollPolicies,
}

enum Finished {
    Complete { password: String },
    Launched,
}

/// Run `create` for `request` to a terminal outcome.
///
/// # Errors
///
/// Only pre-flight failures are returned as `Err`: an invalid name, a name
/// that is already managed, or an unreadable record store. Everything after
/// the first remote call ends in a `ProvisionOutcome`.
pub async fn provision(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    keys: &impl KeyMaterialStore,
    reporter: &impl ProgressReporter,
    settings: &ProvisionSettings<'_>,
    request: &CreateRequest,
) -> Result<ProvisionOutcome, ProvisionError> {
    wincloud_common::validate_instance_name(&request.name)
        .map_err(|e| ProvisionError::InvalidSpec(e.to_string()))?;
    let existing = records
        .find(&request.name)
        .await
        .map_err(|e| ProvisionError::local(&e))?;
    if existing.is_some() {
        return Err(ProvisionError::AlreadyManaged(request.name.clone()));
    }

    let mut state = ProvisioningState::new();
    let result = drive(remote, records, keys, reporter, settings, request, &mut state).await;
    let created = state.created.clone();
    let name = request.name.clone();

    let error = match result {
        Ok(Finished::Complete { password }) => {
            reporter.success("password retrieved");
            return Ok(ProvisionOutcome::Complete {
                name,
                instance_id: created.instance_id.unwrap_or_default(),
                resource_group_id: created.resource_group_id.unwrap_or_default(),
                key_name: created.key_name.unwrap_or_default(),
                password,
            });
        }
        Ok(Finished::Launched) => {
            return Ok(ProvisionOutcome::Launched {
                name,
                instance_id: created.instance_id.unwrap_or_default(),
                resource_group_id: created.resource_group_id.unwrap_or_default(),
                key_name: created.key_name.unwrap_or_default(),
            });
        }
        Err(error) => error,
    };

    tracing::warn!(
        name = %name,
        phase = %state.phase(),
        completed = ?state.completed(),
        error = %error,
        "create failed"
    );

    if !state.should_roll_back() {
        reporter.warn("create failed after the instance started; resources were kept");
        return Ok(ProvisionOutcome::PartialFailure {
            name,
            error,
            created,
        });
    }

    if created.is_empty() {
        return Ok(ProvisionOutcome::RolledBack {
            name: name.clone(),
            error,
            created,
            cleanup: TeardownReport::new(&name),
        });
    }

    reporter.step("rolling back created resources");
    let targets = TeardownTargets::from_created(&name, &request.region, &created);
    let cleanup = teardown::run(remote, keys, &settings.polls.teardown, &targets).await;
    settle_record(records, request, &created, cleanup.is_complete()).await;
    if cleanup.is_complete() {
        reporter.success("rollback complete");
    } else {
        reporter.warn("rollback incomplete; run 'wincloud terminate' to retry");
    }

    Ok(ProvisionOutcome::RolledBack {
        name,
        error,
        created,
        cleanup,
    })
}

async fn drive(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    keys: &impl KeyMaterialStore,
    reporter: &impl ProgressReporter,
    settings: &ProvisionSettings<'_>,
    request: &CreateRequest,
    state: &mut ProvisioningState,
) -> Result<Finished, ProvisionError> {
    let region = request.region.as_str();
    let key_name = wincloud_common::key_pair_name(&request.name);
    let group_name = wincloud_common::resource_group_name(&request.name);

    reporter.step("generating key pair");
    let material = keystore::generate(remote, keys, region, &key_name, settings.key_bits).await?;
    state.created.key_name = Some(key_name.clone());
    state.complete(ProvisionStep::KeyRegistered);

    let mut record = ManagedInstance {
        name: request.name.clone(),
        instance_id: None,
        resource_group: group_name.clone(),
        resource_group_id: None,
        region: region.to_string(),
        key_name: key_name.clone(),
        instance_type: Some(request.instance_type.clone()),
        state: LifecycleState::Provisioning,
        created_at: Utc::now(),
    };
    save(records, &record).await?;

    reporter.step("creating network resources");
    let group_id = template::submit(
        remote,
        region,
        &group_name,
        settings.template_body,
        &[(PARAM_RDP_SOURCE_CIDR, request.rdp_cidr.as_str())],
    )
    .await?;
    state.created.resource_group = Some(group_name.clone());
    state.created.resource_group_id = Some(group_id.clone());
    state.complete(ProvisionStep::TemplateSubmitted);
    record.resource_group_id = Some(group_id);
    save(records, &record).await?;

    let group = template::await_ready(remote, &settings.polls.template, region, &group_name).await?;
    state.complete(ProvisionStep::TemplateReady);
    reporter.success("network resources ready");

    reporter.step("launching instance");
    let instance_id = launcher::launch(remote, &group, request, &key_name).await?;
    state.created.instance_id = Some(instance_id.clone());
    state.complete(ProvisionStep::InstanceLaunched);
    record.instance_id = Some(instance_id.clone());
    save(records, &record).await?;

    if request.skip_password {
        reporter.success("instance launched");
        return Ok(Finished::Launched);
    }

    reporter.step("waiting for instance to boot");
    boot::await_running(remote, &settings.polls.boot, region, &instance_id).await?;
    state.complete(ProvisionStep::InstanceRunning);
    record.state = LifecycleState::Running;
    save(records, &record).await?;
    reporter.success("instance running");

    reporter.step("waiting for the Windows password (this can take several minutes)");
    let blob =
        boot::await_password_material(remote, &settings.polls.password, region, &instance_id)
            .await?;
    state.complete(ProvisionStep::PasswordMaterialAvailable);

    let password = decrypt_password(&blob, &material)?;
    state.complete(ProvisionStep::PasswordDecrypted);
    Ok(Finished::Complete { password })
}

async fn save(
    records: &impl InstanceRecordStore,
    record: &ManagedInstance,
) -> Result<(), ProvisionError> {
    records
        .save(record)
        .await
        .map_err(|e| ProvisionError::local(&e))
}

/// After a rollback: forget the instance if everything is gone, otherwise
/// leave a `terminating` record so `terminate` can finish the job.
async fn settle_record(
    records: &impl InstanceRecordStore,
    request: &CreateRequest,
    created: &CreatedResources,
    cleaned: bool,
) {
    let result = if cleaned {
        records.remove(&request.name).await
    } else {
        match records.find(&request.name).await {
            Ok(saved) => {
                let record = ManagedInstance {
                    name: request.name.clone(),
                    instance_id: created.instance_id.clone(),
                    resource_group: wincloud_common::resource_group_name(&request.name),
                    resource_group_id: created.resource_group_id.clone(),
                    region: request.region.clone(),
                    key_name: wincloud_common::key_pair_name(&request.name),
                    instance_type: Some(request.instance_type.clone()),
                    state: LifecycleState::Terminating,
                    created_at: saved.map_or_else(Utc::now, |r| r.created_at),
                };
                records.save(&record).await
            }
            Err(err) => Err(err),
        }
    };
    if let Err(err) = result {
        tracing::warn!(name = %request.name, error = %err, "could not update record after rollback");
    }
}
