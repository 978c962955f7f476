//! Fleet inspection and instance resolution.
//!
//! Both steps validate raw provider answers: missing bounds or reservation
//! data are hard errors, while members and instances that are merely not
//! ready yet are dropped quietly.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{FleetError, FleetResult};
use crate::provider::{FleetApi, InstanceApi};
use crate::types::*;

/// Resolves a group name into a `FleetSnapshot`.
#[derive(Clone)]
pub struct FleetInspector {
    api: Arc<dyn FleetApi>,
}

impl FleetInspector {
    pub fn new(api: Arc<dyn FleetApi>) -> Self {
        Self { api }
    }

    /// Describe the named fleet.
    ///
    /// Fails with `NotFound` when the group does not exist and with
    /// `IncompleteData` when bounds, capacity, or the member list are absent.
    pub async fn describe_fleet(&self, name: &str) -> FleetResult<FleetSnapshot> {
        let group = self
            .api
            .describe_group(name)
            .await?
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;

        let members = group
            .members
            .ok_or_else(|| incomplete(name, "members"))?;
        let min_size = group.min_size.ok_or_else(|| incomplete(name, "min_size"))?;
        let max_size = group.max_size.ok_or_else(|| incomplete(name, "max_size"))?;
        let current_capacity = group
            .desired_capacity
            .ok_or_else(|| incomplete(name, "desired_capacity"))?;

        if min_size > max_size {
            return Err(FleetError::IncompleteData(format!(
                "{name}: min_size {min_size} exceeds max_size {max_size}"
            )));
        }

        let countable_instance_ids: BTreeSet<InstanceId> = members
            .into_iter()
            .filter(|m| m.lifecycle_state.is_countable())
            .filter_map(|m| m.instance_id)
            .filter(|id| !id.is_empty())
            .collect();

        debug!(
            fleet = %name,
            min_size,
            max_size,
            current_capacity,
            countable = countable_instance_ids.len(),
            "fleet described"
        );

        Ok(FleetSnapshot {
            name: name.to_string(),
            min_size,
            max_size,
            current_capacity,
            countable_instance_ids,
        })
    }
}

/// Resolves instance ids into network-reachable runners.
#[derive(Clone)]
pub struct InstanceResolver {
    api: Arc<dyn InstanceApi>,
}

impl InstanceResolver {
    pub fn new(api: Arc<dyn InstanceApi>) -> Self {
        Self { api }
    }

    /// Resolve the given ids, keeping only running instances with a private
    /// address. An empty id list returns immediately without a provider call.
    pub async fn resolve(&self, ids: &[InstanceId]) -> FleetResult<Vec<ResolvedInstance>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let description = self.api.describe_instances(ids).await?;
        let reservations = description
            .reservations
            .ok_or_else(|| FleetError::IncompleteData("instance reservations not found".into()))?;

        let mut resolved = Vec::new();
        for instance in reservations
            .into_iter()
            .filter_map(|r| r.instances)
            .flatten()
        {
            if instance.state != Some(InstanceStateName::Running) {
                debug!(instance = %instance.instance_id, state = ?instance.state, "instance not running, skipping");
                continue;
            }
            let Some(address) = instance.private_ip_address else {
                debug!(instance = %instance.instance_id, "instance has no private address, skipping");
                continue;
            };

            resolved.push(ResolvedInstance {
                instance_id: instance.instance_id,
                address,
                launch_time: instance.launch_time,
            });
        }

        debug!(requested = ids.len(), resolved = resolved.len(), "instances resolved");
        Ok(resolved)
    }
}

fn incomplete(name: &str, field: &str) -> FleetError {
    FleetError::IncompleteData(format!("{name}: {field} not found"))
}
