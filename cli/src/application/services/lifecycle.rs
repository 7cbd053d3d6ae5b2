//! Start and stop for existing instances, validated against live state.

use serde::Serialize;
use wincloud_common::{InstanceState, LifecycleState};

use crate::application::ports::{Clock, ControlPlane, InstanceRecordStore};
use crate::application::services::Remote;
use crate::application::services::inventory::{launched_id, resolve};
use crate::domain::{ControlPlaneError, ProvisionError};

/// Whether a start/stop actually issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Requested,
    /// Already in (or moving to) the requested state; nothing was sent.
    AlreadyInState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleChange {
    pub name: String,
    pub instance_id: String,
    pub previous: InstanceState,
    pub transition: Transition,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Start,
    Stop,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// `Some(true)` to send the request, `Some(false)` for a no-op, `None` if illegal.
    fn plan(self, state: InstanceState) -> Option<bool> {
        use InstanceState::{Pending, Running, ShuttingDown, Stopped, Stopping, Terminated};
        match (self, state) {
            (Self::Start, Stopped) | (Self::Stop, Running | Pending) => Some(true),
            (Self::Start, Running | Pending) | (Self::Stop, Stopped | Stopping) => Some(false),
            (Self::Start, Stopping | ShuttingDown | Terminated)
            | (Self::Stop, ShuttingDown | Terminated) => None,
        }
    }

    fn recorded(self) -> LifecycleState {
        match self {
            Self::Start => LifecycleState::Running,
            Self::Stop => LifecycleState::Stopped,
        }
    }
}

/// Start a stopped instance. Starting a running or pending one is a no-op.
///
/// # Errors
///
/// `InvalidStateTransition` while stopping, shutting down or terminated;
/// `UnknownInstance` for unknown names.
pub async fn start(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    name_or_id: &str,
) -> Result<LifecycleChange, ProvisionError> {
    transition(remote, records, name_or_id, Operation::Start).await
}

/// Stop a running instance. Stopping a stopped or stopping one is a no-op.
///
/// # Errors
///
/// `InvalidStateTransition` while shutting down or terminated;
/// `UnknownInstance` for unknown names.
pub async fn stop(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    name_or_id: &str,
) -> Result<LifecycleChange, ProvisionError> {
    transition(remote, records, name_or_id, Operation::Stop).await
}

async fn transition(
    remote: &Remote<'_, impl ControlPlane, impl Clock>,
    records: &impl InstanceRecordStore,
    name_or_id: &str,
    op: Operation,
) -> Result<LifecycleChange, ProvisionError> {
    let mut record = resolve(records, name_or_id).await?;
    let instance_id = launched_id(&record, op.verb())?.to_string();
    let region = record.region.clone();

    let current = match remote
        .call("describe-instances", || {
            remote.cp.describe_instance(&region, &instance_id)
        })
        .await
    {
        Ok(details) => details.state,
        Err(ControlPlaneError::NotFound(_)) => Some(InstanceState::Terminated),
        Err(e) => return Err(e.into()),
    };
    let Some(current) = current else {
        return Err(ProvisionError::InvalidStateTransition {
            instance_id,
            operation: op.verb(),
            state: "unknown".into(),
        });
    };

    let send = op.plan(current).ok_or_else(|| ProvisionError::InvalidStateTransition {
        instance_id: instance_id.clone(),
        operation: op.verb(),
        state: current.to_string(),
    })?;

    if send {
        let sent = match op {
            Operation::Start => {
                remote
                    .call("start-instances", || {
                        remote.cp.start_instance(&region, &instance_id)
                    })
                    .await
            }
            Operation::Stop => {
                remote
                    .call("stop-instances", || {
                        remote.cp.stop_instance(&region, &instance_id)
                    })
                    .await
            }
        };
        sent?;
        tracing::info!(name = %record.name, instance_id = %instance_id, op = op.verb(), "state change requested");
    }

    if record.state != op.recorded() {
        record.state = op.recorded();
        records
            .save(&record)
            .await
            .map_err(|e| ProvisionError::local(&e))?;
    }

    Ok(LifecycleChange {
        name: record.name,
        instance_id,
        previous: current,
        transition: if send {
            Transition::Requested
        } else {
            Transition::AlreadyInState
        },
    })
}
