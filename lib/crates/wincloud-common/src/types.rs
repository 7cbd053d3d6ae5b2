use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed instance as the user reasons about it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Provisioning,
    Running,
    Stopped,
    Terminating,
    Terminated,
    Failed,
}

impl LifecycleState {
    /// `terminated` and `failed` are terminal; every other state still owns
    /// remote resources.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance state as reported by the control plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    /// Parse the provider's state name (`pending`, `shutting-down`, ...).
    #[must_use]
    pub fn from_provider(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }

    /// Project the provider state onto the user-facing lifecycle.
    #[must_use]
    pub fn lifecycle(self) -> LifecycleState {
        match self {
            Self::Pending => LifecycleState::Provisioning,
            Self::Running => LifecycleState::Running,
            Self::Stopping | Self::Stopped => LifecycleState::Stopped,
            Self::ShuttingDown => LifecycleState::Terminating,
            Self::Terminated => LifecycleState::Terminated,
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a template-created resource group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceGroupStatus {
    InProgress,
    Created,
    Failed,
    Deleting,
    Deleted,
    DeleteFailed,
}

impl ResourceGroupStatus {
    /// Terminal for a create: either usable or failed.
    #[must_use]
    pub fn is_create_terminal(self) -> bool {
        matches!(self, Self::Created | Self::Failed)
    }
}

/// Persisted record of one managed instance, keyed by logical name.
///
/// Holds only ownership mapping. Live state (running/stopped) is always
/// re-queried from the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedInstance {
    /// Logical name chosen by the user.
    pub name: String,
    /// Control-plane instance id; absent until the launch is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Resource-group name (deterministic from `name`).
    pub resource_group: String,
    /// Control-plane resource-group id; absent until the template is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub region: String,
    /// Name of the registered key pair.
    pub key_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Orchestration state last recorded locally.
    pub state: LifecycleState,
    pub created_at: DateTime<Utc>,
}

impl ManagedInstance {
    /// True when `id` is either the logical name or the instance id.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        self.name == id || self.instance_id.as_deref() == Some(id)
    }
}

/// One row of `wincloud list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

/// Live detail for `wincloud status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceDetails {
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InstanceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_time: Option<String>,
}

/// Output of `wincloud status`: the persisted record joined with live state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceStatus {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub region: String,
    pub resource_group: String,
    pub key_name: String,
    /// Live state when the instance could be described, else the recorded one.
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<InstanceDetails>,
}
