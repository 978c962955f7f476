//! Provider capability traits.
//!
//! The controller never talks to a cloud SDK directly. An adapter
//! implements these traits over whatever transport it uses; the in-crate
//! `InMemoryFleet` implements them for tests and dry runs.

use async_trait::async_trait;

use crate::error::FleetResult;
use crate::types::{GroupDescription, InstanceId, InstancesDescription};

/// Autoscaling group operations.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Describe the named group, or `None` if it does not exist.
    async fn describe_group(&self, name: &str) -> FleetResult<Option<GroupDescription>>;

    /// Set the group's desired capacity.
    ///
    /// When `honor_cooldown` is set the provider may reject the request with
    /// `FleetError::ScalingActivityInProgress` while a cooldown is active.
    async fn set_desired_capacity(
        &self,
        name: &str,
        capacity: u32,
        honor_cooldown: bool,
    ) -> FleetResult<()>;
}

/// Instance inventory operations.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Describe the given instances.
    async fn describe_instances(&self, ids: &[InstanceId]) -> FleetResult<InstancesDescription>;
}
