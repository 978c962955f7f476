//! Metric publishing.
//!
//! Each invocation emits three data points into the configured namespace:
//! the fleet's current job count, the desired capacity, and the actual
//! capacity. All three carry the same timestamp, read once from the
//! injected clock.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use runnerscale_fleet::{ClusterMetrics, ControllerConfig};

use crate::clock::Clock;

/// Errors raised by a metric sink.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("metric sink rejected data points: {0}")]
    Sink(String),
}

/// Unit attached to a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Count,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Count => "Count",
        }
    }
}

/// One numeric observation.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub name: String,
    pub value: f64,
    pub timestamp: SystemTime,
    pub unit: Unit,
}

/// Destination for published data points.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn put_data_points(&self, namespace: &str, points: &[DataPoint])
    -> Result<(), PublishError>;
}

/// Names of the three published series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    pub job_count: String,
    pub target_capacity: String,
    pub actual_capacity: String,
}

impl MetricNames {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            job_count: config.job_count_metric_name.clone(),
            target_capacity: config.target_capacity_metric_name.clone(),
            actual_capacity: config.actual_capacity_metric_name.clone(),
        }
    }
}

/// Publishes the controller's view of the fleet.
#[derive(Clone)]
pub struct MetricsPublisher {
    sink: Arc<dyn MetricSink>,
    clock: Arc<dyn Clock>,
    namespace: String,
    names: MetricNames,
}

impl MetricsPublisher {
    pub fn new(
        sink: Arc<dyn MetricSink>,
        clock: Arc<dyn Clock>,
        namespace: impl Into<String>,
        names: MetricNames,
    ) -> Self {
        Self {
            sink,
            clock,
            namespace: namespace.into(),
            names,
        }
    }

    /// Build the data points for one invocation.
    pub fn data_points(&self, metrics: &ClusterMetrics, desired_capacity: u32) -> Vec<DataPoint> {
        let timestamp = self.clock.now();
        let point = |name: &str, value: f64| DataPoint {
            name: name.to_string(),
            value,
            timestamp,
            unit: Unit::Count,
        };

        vec![
            point(&self.names.job_count, metrics.current_job_count as f64),
            point(&self.names.target_capacity, f64::from(desired_capacity)),
            point(&self.names.actual_capacity, f64::from(metrics.current_instances)),
        ]
    }

    /// Send the invocation's data points to the sink.
    pub async fn publish(
        &self,
        metrics: &ClusterMetrics,
        desired_capacity: u32,
    ) -> Result<(), PublishError> {
        let points = self.data_points(metrics, desired_capacity);
        self.sink.put_data_points(&self.namespace, &points).await?;
        debug!(namespace = %self.namespace, points = points.len(), "metrics published");
        Ok(())
    }
}

/// Sink that writes each data point as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl MetricSink for TracingSink {
    async fn put_data_points(
        &self,
        namespace: &str,
        points: &[DataPoint],
    ) -> Result<(), PublishError> {
        for p in points {
            let epoch = p
                .timestamp
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            info!(
                %namespace,
                metric = %p.name,
                value = p.value,
                unit = p.unit.as_str(),
                timestamp = epoch,
                "data point"
            );
        }
        Ok(())
    }
}
