//! Domain types for the runner fleet.
//!
//! Two families live here: the raw records a provider hands back
//! (`GroupDescription`, `InstancesDescription`) with every field optional
//! the way cloud APIs report them, and the validated values that flow
//! through one controller invocation (`FleetSnapshot` → `ResolvedInstance`
//! → `InstanceSample` → `ClusterMetrics`).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Provider-assigned identifier of a runner instance.
pub type InstanceId = String;

// ── Provider records ───────────────────────────────────────────────

/// Lifecycle state of an autoscaling group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    InService,
    Standby,
    Terminating,
    Terminated,
    Detaching,
    Detached,
    #[serde(other)]
    Unknown,
}

impl LifecycleState {
    /// Whether a member in this state counts toward fleet capacity.
    pub fn is_countable(self) -> bool {
        matches!(self, LifecycleState::InService | LifecycleState::Pending)
    }
}

/// One member of an autoscaling group as listed by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub instance_id: Option<InstanceId>,
    pub lifecycle_state: LifecycleState,
}

/// Raw description of an autoscaling group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub name: String,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
    /// The group's desired capacity, used as the fleet's current capacity.
    pub desired_capacity: Option<u32>,
    pub members: Option<Vec<GroupMember>>,
}

/// Machine state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceStateName {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    #[serde(other)]
    Unknown,
}

/// Raw description of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: InstanceId,
    pub private_ip_address: Option<String>,
    pub state: Option<InstanceStateName>,
    /// Unix timestamp (seconds) the instance was launched.
    pub launch_time: Option<u64>,
}

/// A reservation groups instances launched by one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reservation {
    pub instances: Option<Vec<InstanceDescription>>,
}

/// Raw answer to an instance description request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstancesDescription {
    pub reservations: Option<Vec<Reservation>>,
}

// ── Invocation values ──────────────────────────────────────────────

/// Validated view of an autoscaling group, taken once per invocation.
///
/// `min_size <= max_size` always holds. `current_capacity` may sit outside
/// the bounds while the provider converges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSnapshot {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub current_capacity: u32,
    pub countable_instance_ids: BTreeSet<InstanceId>,
}

/// A countable instance that is running and has a private address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstance {
    pub instance_id: InstanceId,
    pub address: String,
    pub launch_time: Option<u64>,
}

/// Load reading for one resolved instance.
///
/// A failed sample carries `load == 0` and an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSample {
    pub instance_id: InstanceId,
    pub load: u64,
    pub error: Option<String>,
}

impl InstanceSample {
    pub fn ok(instance_id: impl Into<InstanceId>, load: u64) -> Self {
        Self {
            instance_id: instance_id.into(),
            load,
            error: None,
        }
    }

    pub fn failed(instance_id: impl Into<InstanceId>, error: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            load: 0,
            error: Some(error.into()),
        }
    }

    /// Whether the sample succeeded.
    pub fn is_active(&self) -> bool {
        self.error.is_none()
    }
}

/// Fleet-wide totals for one invocation.
///
/// `current_instances` is capacity (the group's desired capacity) while
/// `active_instances` is activity (instances that answered a sample).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMetrics {
    pub min_instances: u32,
    pub max_instances: u32,
    pub current_instances: u32,
    pub active_instances: u32,
    pub current_job_count: u64,
    pub samples: Vec<InstanceSample>,
}

impl ClusterMetrics {
    /// Reduce samples into totals, taking bounds and capacity from the snapshot.
    pub fn from_samples(snapshot: &FleetSnapshot, samples: Vec<InstanceSample>) -> Self {
        let current_job_count = samples.iter().map(|s| s.load).sum();
        let active_instances = samples.iter().filter(|s| s.is_active()).count() as u32;

        Self {
            min_instances: snapshot.min_size,
            max_instances: snapshot.max_size,
            current_instances: snapshot.current_capacity,
            active_instances,
            current_job_count,
            samples,
        }
    }
}
