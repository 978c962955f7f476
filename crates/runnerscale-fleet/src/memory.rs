//! In-memory fleet provider.
//!
//! Implements `FleetApi` and `InstanceApi` over a static `Inventory` and
//! simulates the provider's cooldown guard: after a successful resize,
//! requests that honor cooldown are rejected until `cooldown_secs` have
//! elapsed. Every resize request is recorded for inspection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{FleetError, FleetResult};
use crate::provider::{FleetApi, InstanceApi};
use crate::types::*;

/// Static description of a fleet, loadable from TOML.
///
/// ```toml
/// cooldown_secs = 300
///
/// [group]
/// name = "runners"
/// min_size = 1
/// max_size = 10
/// desired_capacity = 2
///
/// [[group.members]]
/// instance_id = "i-0a1"
/// lifecycle_state = "in_service"
///
/// [[reservations]]
/// [[reservations.instances]]
/// instance_id = "i-0a1"
/// private_ip_address = "10.0.1.17"
/// state = "running"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub cooldown_secs: u64,
    pub group: GroupDescription,
    pub reservations: Option<Vec<Reservation>>,
}

impl Inventory {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// A recorded `set_desired_capacity` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeCall {
    pub capacity: u32,
    pub honor_cooldown: bool,
}

struct FleetState {
    inventory: Inventory,
    last_scaled: Option<Instant>,
    resize_calls: Vec<ResizeCall>,
    describe_instances_calls: usize,
    resize_failure: Option<String>,
}

/// Provider backed by an in-memory `Inventory`.
pub struct InMemoryFleet {
    state: Mutex<FleetState>,
}

impl InMemoryFleet {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            state: Mutex::new(FleetState {
                inventory,
                last_scaled: None,
                resize_calls: Vec::new(),
                describe_instances_calls: 0,
                resize_failure: None,
            }),
        }
    }

    /// Make every subsequent resize fail with a non-recoverable provider error.
    pub async fn fail_resizes_with(&self, message: impl Into<String>) {
        self.state.lock().await.resize_failure = Some(message.into());
    }

    /// Start a cooldown window as if a scaling activity just completed.
    pub async fn start_cooldown(&self) {
        self.state.lock().await.last_scaled = Some(Instant::now());
    }

    /// All resize requests received, accepted or not.
    pub async fn resize_calls(&self) -> Vec<ResizeCall> {
        self.state.lock().await.resize_calls.clone()
    }

    /// Number of `describe_instances` requests received.
    pub async fn describe_instances_calls(&self) -> usize {
        self.state.lock().await.describe_instances_calls
    }

    /// The group's current desired capacity.
    pub async fn desired_capacity(&self) -> Option<u32> {
        self.state.lock().await.inventory.group.desired_capacity
    }
}

#[async_trait]
impl FleetApi for InMemoryFleet {
    async fn describe_group(&self, name: &str) -> FleetResult<Option<GroupDescription>> {
        let state = self.state.lock().await;
        let group = &state.inventory.group;
        Ok((group.name == name).then(|| group.clone()))
    }

    async fn set_desired_capacity(
        &self,
        name: &str,
        capacity: u32,
        honor_cooldown: bool,
    ) -> FleetResult<()> {
        let mut state = self.state.lock().await;
        state.resize_calls.push(ResizeCall {
            capacity,
            honor_cooldown,
        });

        if state.inventory.group.name != name {
            return Err(FleetError::NotFound(name.to_string()));
        }
        if let Some(message) = &state.resize_failure {
            return Err(FleetError::Provider(message.clone()));
        }

        let cooldown = Duration::from_secs(state.inventory.cooldown_secs);
        let cooling_down = state
            .last_scaled
            .is_some_and(|at| at.elapsed() < cooldown);
        if honor_cooldown && cooling_down {
            return Err(FleetError::ScalingActivityInProgress(format!(
                "{name} is within its cooldown window"
            )));
        }

        state.inventory.group.desired_capacity = Some(capacity);
        state.last_scaled = Some(Instant::now());
        info!(fleet = %name, capacity, honor_cooldown, "desired capacity updated");
        Ok(())
    }
}

#[async_trait]
impl InstanceApi for InMemoryFleet {
    async fn describe_instances(&self, ids: &[InstanceId]) -> FleetResult<InstancesDescription> {
        let mut state = self.state.lock().await;
        state.describe_instances_calls += 1;

        let reservations = state.inventory.reservations.as_ref().map(|reservations| {
            reservations
                .iter()
                .map(|r| Reservation {
                    instances: r.instances.as_ref().map(|instances| {
                        instances
                            .iter()
                            .filter(|i| ids.contains(&i.instance_id))
                            .cloned()
                            .collect()
                    }),
                })
                .collect()
        });

        Ok(InstancesDescription { reservations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"
cooldown_secs = 300

[group]
name = "runners"
min_size = 1
max_size = 10
desired_capacity = 2

[[group.members]]
instance_id = "i-1"
lifecycle_state = "in_service"

[[group.members]]
instance_id = "i-2"
lifecycle_state = "pending"

[[reservations]]
[[reservations.instances]]
instance_id = "i-1"
private_ip_address = "10.0.1.17"
state = "running"
launch_time = 1700000000

[[reservations.instances]]
instance_id = "i-2"
state = "pending"
"#;

    fn fleet() -> InMemoryFleet {
        InMemoryFleet::new(Inventory::from_toml(INVENTORY).unwrap())
    }

    #[test]
    fn parses_inventory() {
        let inventory = Inventory::from_toml(INVENTORY).unwrap();
        assert_eq!(inventory.cooldown_secs, 300);
        assert_eq!(inventory.group.max_size, Some(10));
        assert_eq!(inventory.group.members.as_ref().unwrap().len(), 2);
        let reservations = inventory.reservations.unwrap();
        let instances = reservations[0].instances.as_ref().unwrap();
        assert_eq!(instances[1].state, Some(InstanceStateName::Pending));
        assert_eq!(instances[1].private_ip_address, None);
    }

    #[tokio::test]
    async fn describe_group_by_name() {
        let fleet = fleet();
        assert!(fleet.describe_group("runners").await.unwrap().is_some());
        assert!(fleet.describe_group("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn describe_instances_filters_by_id() {
        let fleet = fleet();
        let description = fleet
            .describe_instances(&["i-2".to_string()])
            .await
            .unwrap();
        let reservations = description.reservations.unwrap();
        let instances = reservations[0].instances.as_ref().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "i-2");
        assert_eq!(fleet.describe_instances_calls().await, 1);
    }

    #[tokio::test]
    async fn resize_updates_capacity() {
        let fleet = fleet();
        fleet.set_desired_capacity("runners", 5, false).await.unwrap();
        assert_eq!(fleet.desired_capacity().await, Some(5));
        assert_eq!(
            fleet.resize_calls().await,
            vec![ResizeCall {
                capacity: 5,
                honor_cooldown: false
            }]
        );
    }

    #[tokio::test]
    async fn cooldown_rejects_honoring_requests() {
        let fleet = fleet();
        fleet.start_cooldown().await;

        let err = fleet
            .set_desired_capacity("runners", 1, true)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(fleet.desired_capacity().await, Some(2));

        // Bypassing cooldown still goes through.
        fleet.set_desired_capacity("runners", 4, false).await.unwrap();
        assert_eq!(fleet.desired_capacity().await, Some(4));
    }

    #[tokio::test]
    async fn zero_cooldown_never_rejects() {
        let mut inventory = Inventory::from_toml(INVENTORY).unwrap();
        inventory.cooldown_secs = 0;
        let fleet = InMemoryFleet::new(inventory);
        fleet.start_cooldown().await;

        fleet.set_desired_capacity("runners", 1, true).await.unwrap();
        assert_eq!(fleet.desired_capacity().await, Some(1));
    }

    #[tokio::test]
    async fn injected_failure_is_fatal() {
        let fleet = fleet();
        fleet.fail_resizes_with("access denied").await;

        let err = fleet
            .set_desired_capacity("runners", 3, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Provider(ref m) if m == "access denied"));
        assert!(!err.is_recoverable());
    }
}
