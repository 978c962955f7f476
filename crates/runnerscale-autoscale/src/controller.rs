//! Controller — one pass of the decision pipeline, and the loop that
//! repeats it on a fixed interval.
//!
//! ```text
//! FleetInspector → InstanceResolver → MetricsAggregator
//!     → CapacityPolicy → MetricsPublisher → ScalingActuator
//! ```
//!
//! Actuation never starts before the aggregate is complete. Publishing and
//! actuation are both attempted even if the other fails.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use runnerscale_fleet::{
    ClusterMetrics, ControllerConfig, FleetApi, FleetInspector, InstanceApi, InstanceId,
    InstanceResolver,
};
use runnerscale_metrics::{
    Clock, LoadSampler, MetricNames, MetricSink, MetricsAggregator, MetricsPublisher,
};

use crate::actuator::{ScaleAction, ScalingActuator};
use crate::error::ControllerResult;
use crate::policy::{CapacityPolicy, ScalingDecision};

/// Outcome of one successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    pub metrics: ClusterMetrics,
    pub decision: ScalingDecision,
    pub action: ScaleAction,
}

/// Right-sizes one runner fleet.
pub struct Controller {
    fleet_name: String,
    inspector: FleetInspector,
    resolver: InstanceResolver,
    aggregator: MetricsAggregator,
    policy: CapacityPolicy,
    publisher: MetricsPublisher,
    actuator: ScalingActuator,
}

impl Controller {
    /// Assemble a controller from configuration and provider capabilities.
    pub fn new(
        config: &ControllerConfig,
        fleet: Arc<dyn FleetApi>,
        instances: Arc<dyn InstanceApi>,
        sampler: Arc<dyn LoadSampler>,
        sink: Arc<dyn MetricSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut aggregator = MetricsAggregator::new(sampler);
        if let Some(limit) = config.max_concurrent_samples {
            aggregator = aggregator.with_max_concurrency(limit);
        }

        Self {
            fleet_name: config.autoscaling_group_name.clone(),
            inspector: FleetInspector::new(fleet.clone()),
            resolver: InstanceResolver::new(instances),
            aggregator,
            policy: CapacityPolicy::from_config(config),
            publisher: MetricsPublisher::new(
                sink,
                clock,
                config.metric_namespace.clone(),
                MetricNames::from_config(config),
            ),
            actuator: ScalingActuator::new(fleet),
        }
    }

    pub fn fleet_name(&self) -> &str {
        &self.fleet_name
    }

    /// Gather the fleet's current metrics.
    pub async fn gather_cluster_metrics(&self) -> ControllerResult<ClusterMetrics> {
        let snapshot = self.inspector.describe_fleet(&self.fleet_name).await?;
        if snapshot.countable_instance_ids.is_empty() {
            info!(fleet = %self.fleet_name, "no instances available in the fleet");
            return Ok(self.aggregator.gather(&snapshot, &[]).await);
        }

        info!(
            fleet = %self.fleet_name,
            countable = snapshot.countable_instance_ids.len(),
            "instances in fleet"
        );
        let ids: Vec<InstanceId> = snapshot.countable_instance_ids.iter().cloned().collect();
        let resolved = self.resolver.resolve(&ids).await?;

        Ok(self.aggregator.gather(&snapshot, &resolved).await)
    }

    /// Run the pipeline once: observe, decide, publish, actuate.
    pub async fn run_once(&self) -> ControllerResult<InvocationReport> {
        info!(fleet = %self.fleet_name, "retrieving cluster metrics");
        let metrics = self.gather_cluster_metrics().await?;

        let decision = self.policy.decide(&metrics);
        info!(
            fleet = %self.fleet_name,
            jobs = metrics.current_job_count,
            active = metrics.active_instances,
            current = metrics.current_instances,
            desired = decision.desired_capacity,
            "desired capacity determined"
        );

        let published = self.publisher.publish(&metrics, decision.desired_capacity).await;
        if let Err(e) = &published {
            warn!(fleet = %self.fleet_name, error = %e, "publishing metrics failed");
        }

        let action = self
            .actuator
            .adjust(
                &self.fleet_name,
                metrics.current_instances,
                decision.desired_capacity,
            )
            .await?;
        published?;

        info!(fleet = %self.fleet_name, ?action, "invocation complete");
        Ok(InvocationReport {
            metrics,
            decision,
            action,
        })
    }

    /// Run the controller on a fixed interval until shutdown.
    ///
    /// The first invocation runs immediately. A failed invocation is logged
    /// and the next tick retries from scratch.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            fleet = %self.fleet_name,
            interval_secs = interval.as_secs(),
            "controller started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(fleet = %self.fleet_name, error = %e, "controller invocation failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!(fleet = %self.fleet_name, "controller shutting down");
                    break;
                }
            }
        }
    }
}
