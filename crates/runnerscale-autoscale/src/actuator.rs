//! Scaling actuator. Applies a capacity decision to the fleet.
//!
//! Scale-up bypasses the provider cooldown, scale-down honors it. A
//! cooldown rejection is not an error.

use std::sync::Arc;

use tracing::{info, warn};

use runnerscale_fleet::{FleetApi, FleetResult};

/// What the actuator did with a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    /// Desired capacity already matches; no request issued.
    NoChange,
    ScaledUp { from: u32, to: u32 },
    ScaledDown { from: u32, to: u32 },
    /// The provider refused because scaling is in progress or cooling down.
    Deferred { from: u32, to: u32 },
}

/// Issues resize requests against the fleet.
#[derive(Clone)]
pub struct ScalingActuator {
    api: Arc<dyn FleetApi>,
}

impl ScalingActuator {
    pub fn new(api: Arc<dyn FleetApi>) -> Self {
        Self { api }
    }

    /// Move `fleet` from `current` to `desired` capacity.
    ///
    /// An in-progress or cooldown rejection is returned as
    /// `ScaleAction::Deferred`; every other provider error propagates.
    pub async fn adjust(&self, fleet: &str, current: u32, desired: u32) -> FleetResult<ScaleAction> {
        if current == desired {
            info!(%fleet, capacity = current, "fleet capacity does not require updates");
            return Ok(ScaleAction::NoChange);
        }

        let scaling_up = desired > current;
        let honor_cooldown = !scaling_up;

        info!(%fleet, from = current, to = desired, honor_cooldown, "setting desired capacity");
        match self
            .api
            .set_desired_capacity(fleet, desired, honor_cooldown)
            .await
        {
            Ok(()) if scaling_up => Ok(ScaleAction::ScaledUp {
                from: current,
                to: desired,
            }),
            Ok(()) => Ok(ScaleAction::ScaledDown {
                from: current,
                to: desired,
            }),
            Err(e) if e.is_recoverable() => {
                warn!(
                    %fleet,
                    error = %e,
                    "cannot modify fleet capacity while scaling is in progress or cooling down"
                );
                Ok(ScaleAction::Deferred {
                    from: current,
                    to: desired,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runnerscale_fleet::{FleetError, GroupDescription, InMemoryFleet, Inventory, ResizeCall};

    fn fleet(cooldown_secs: u64) -> Arc<InMemoryFleet> {
        Arc::new(InMemoryFleet::new(Inventory {
            cooldown_secs,
            group: GroupDescription {
                name: "runners".to_string(),
                min_size: Some(1),
                max_size: Some(10),
                desired_capacity: Some(3),
                members: Some(Vec::new()),
            },
            reservations: Some(Vec::new()),
        }))
    }

    #[tokio::test]
    async fn equal_capacity_issues_no_request() {
        let fleet = fleet(0);
        let actuator = ScalingActuator::new(fleet.clone());

        let action = actuator.adjust("runners", 3, 3).await.unwrap();
        assert_eq!(action, ScaleAction::NoChange);
        assert!(fleet.resize_calls().await.is_empty());
    }

    #[tokio::test]
    async fn scale_up_bypasses_cooldown() {
        let fleet = fleet(300);
        fleet.start_cooldown().await;
        let actuator = ScalingActuator::new(fleet.clone());

        let action = actuator.adjust("runners", 2, 3).await.unwrap();
        assert_eq!(action, ScaleAction::ScaledUp { from: 2, to: 3 });
        assert_eq!(
            fleet.resize_calls().await,
            vec![ResizeCall {
                capacity: 3,
                honor_cooldown: false
            }]
        );
    }

    #[tokio::test]
    async fn scale_down_honors_cooldown() {
        let fleet = fleet(0);
        let actuator = ScalingActuator::new(fleet.clone());

        let action = actuator.adjust("runners", 5, 1).await.unwrap();
        assert_eq!(action, ScaleAction::ScaledDown { from: 5, to: 1 });
        assert_eq!(
            fleet.resize_calls().await,
            vec![ResizeCall {
                capacity: 1,
                honor_cooldown: true
            }]
        );
        assert_eq!(fleet.desired_capacity().await, Some(1));
    }

    #[tokio::test]
    async fn cooldown_rejection_is_deferred() {
        let fleet = fleet(300);
        fleet.start_cooldown().await;
        let actuator = ScalingActuator::new(fleet.clone());

        let action = actuator.adjust("runners", 5, 1).await.unwrap();
        assert_eq!(action, ScaleAction::Deferred { from: 5, to: 1 });
        assert_eq!(fleet.desired_capacity().await, Some(3));
    }

    #[tokio::test]
    async fn other_failures_propagate() {
        let fleet = fleet(0);
        fleet.fail_resizes_with("access denied").await;
        let actuator = ScalingActuator::new(fleet);

        let err = actuator.adjust("runners", 2, 4).await.unwrap_err();
        assert!(matches!(err, FleetError::Provider(_)));
    }
}
