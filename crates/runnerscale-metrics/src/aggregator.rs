//! Fleet-wide load aggregation.
//!
//! Spawns one sampling task per resolved instance, waits for all of them,
//! and reduces the readings. The reduction is a sum and a count, so the
//! order tasks finish in does not matter; the returned samples keep the
//! order of the input instances.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use runnerscale_fleet::{ClusterMetrics, FleetSnapshot, InstanceSample, ResolvedInstance};

use crate::sampler::LoadSampler;

/// Fans load sampling out over the fleet.
#[derive(Clone)]
pub struct MetricsAggregator {
    sampler: Arc<dyn LoadSampler>,
    /// Caps in-flight samples when set.
    permits: Option<Arc<Semaphore>>,
}

impl MetricsAggregator {
    /// Create an aggregator that samples every instance at once.
    pub fn new(sampler: Arc<dyn LoadSampler>) -> Self {
        Self {
            sampler,
            permits: None,
        }
    }

    /// Limit the number of samples in flight.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.permits = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Sample every instance and reduce the results into `ClusterMetrics`.
    ///
    /// An empty instance list yields zero load and zero active instances
    /// without sampling anything.
    pub async fn gather(
        &self,
        snapshot: &FleetSnapshot,
        instances: &[ResolvedInstance],
    ) -> ClusterMetrics {
        if instances.is_empty() {
            info!(fleet = %snapshot.name, "no runner instances available to sample");
            return ClusterMetrics::from_samples(snapshot, Vec::new());
        }

        let samples = self.sample_all(instances).await;
        let metrics = ClusterMetrics::from_samples(snapshot, samples);

        info!(
            fleet = %snapshot.name,
            sampled = metrics.samples.len(),
            active = metrics.active_instances,
            jobs = metrics.current_job_count,
            "all metrics retrieved"
        );
        metrics
    }

    /// Sample each instance concurrently, one task per instance.
    pub async fn sample_all(&self, instances: &[ResolvedInstance]) -> Vec<InstanceSample> {
        let handles: Vec<_> = instances
            .iter()
            .cloned()
            .map(|instance| {
                let sampler = self.sampler.clone();
                let permits = self.permits.clone();
                tokio::spawn(async move {
                    let _permit = match permits {
                        Some(p) => p.acquire_owned().await.ok(),
                        None => None,
                    };
                    sample_one(sampler.as_ref(), &instance).await
                })
            })
            .collect();

        let mut samples = Vec::with_capacity(handles.len());
        for (instance, handle) in instances.iter().zip(handles) {
            let sample = match handle.await {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(instance = %instance.instance_id, error = %e, "sampling task failed");
                    InstanceSample::failed(&instance.instance_id, e.to_string())
                }
            };
            samples.push(sample);
        }
        samples
    }
}

async fn sample_one(sampler: &dyn LoadSampler, instance: &ResolvedInstance) -> InstanceSample {
    match sampler.sample(instance).await {
        Ok(load) => {
            debug!(
                instance = %instance.instance_id,
                address = %instance.address,
                age_secs = ?instance.launch_time.map(age_secs),
                jobs = load,
                "runner sampled"
            );
            InstanceSample::ok(&instance.instance_id, load)
        }
        Err(e) => {
            warn!(
                instance = %instance.instance_id,
                address = %instance.address,
                error = %e,
                "failed to sample runner metrics"
            );
            InstanceSample::failed(&instance.instance_id, e.to_string())
        }
    }
}

fn age_secs(launch_time: u64) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .saturating_sub(launch_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::sampler::SampleError;

    /// Answers from a fixed table keyed by instance id; unknown ids time out.
    struct ScriptedSampler {
        loads: HashMap<String, u64>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedSampler {
        fn new(loads: &[(&str, u64)]) -> Arc<Self> {
            Arc::new(Self {
                loads: loads.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LoadSampler for ScriptedSampler {
        async fn sample(&self, instance: &ResolvedInstance) -> Result<u64, SampleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.loads
                .get(&instance.instance_id)
                .copied()
                .ok_or(SampleError::Timeout(Duration::from_secs(15)))
        }
    }

    fn snapshot() -> FleetSnapshot {
        FleetSnapshot {
            name: "runners".to_string(),
            min_size: 1,
            max_size: 10,
            current_capacity: 2,
            countable_instance_ids: BTreeSet::new(),
        }
    }

    fn instance(id: &str) -> ResolvedInstance {
        ResolvedInstance {
            instance_id: id.to_string(),
            address: format!("10.0.0.{}", id.trim_start_matches("i-")),
            launch_time: None,
        }
    }

    #[tokio::test]
    async fn empty_fleet_skips_sampling() {
        let sampler = ScriptedSampler::new(&[]);
        let aggregator = MetricsAggregator::new(sampler.clone());

        let metrics = aggregator.gather(&snapshot(), &[]).await;
        assert_eq!(metrics.current_job_count, 0);
        assert_eq!(metrics.active_instances, 0);
        assert!(metrics.samples.is_empty());
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sums_loads_across_instances() {
        let sampler = ScriptedSampler::new(&[("i-1", 3), ("i-2", 0), ("i-3", 5)]);
        let aggregator = MetricsAggregator::new(sampler.clone());

        let instances = [instance("i-1"), instance("i-2"), instance("i-3")];
        let metrics = aggregator.gather(&snapshot(), &instances).await;

        assert_eq!(metrics.current_job_count, 8);
        assert_eq!(metrics.active_instances, 3);
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timed_out_instance_contributes_nothing() {
        // i-2 has no scripted load, so it times out.
        let sampler = ScriptedSampler::new(&[("i-1", 6)]);
        let aggregator = MetricsAggregator::new(sampler);

        let instances = [instance("i-1"), instance("i-2")];
        let metrics = aggregator.gather(&snapshot(), &instances).await;

        assert_eq!(metrics.current_job_count, 6);
        assert_eq!(metrics.active_instances, 1);
        assert_eq!(metrics.samples[1].load, 0);
        assert!(metrics.samples[1].error.as_deref().unwrap().contains("timed out"));
        // Capacity is unaffected by failed samples.
        assert_eq!(metrics.current_instances, 2);
    }

    #[tokio::test]
    async fn samples_keep_input_order() {
        let sampler = ScriptedSampler::new(&[("i-1", 1), ("i-2", 2), ("i-3", 3), ("i-4", 4)]);
        let aggregator = MetricsAggregator::new(sampler);

        let instances: Vec<_> = ["i-4", "i-2", "i-3", "i-1"].iter().map(|id| instance(id)).collect();
        let samples = aggregator.sample_all(&instances).await;

        let ids: Vec<_> = samples.iter().map(|s| s.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["i-4", "i-2", "i-3", "i-1"]);
    }

    #[tokio::test]
    async fn unbounded_fan_out_samples_concurrently() {
        let loads: Vec<(String, u64)> = (0..8).map(|n| (format!("i-{n}"), 1)).collect();
        let refs: Vec<(&str, u64)> = loads.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let sampler = ScriptedSampler::new(&refs);
        let aggregator = MetricsAggregator::new(sampler.clone());

        let instances: Vec<_> = loads.iter().map(|(id, _)| instance(id)).collect();
        let metrics = aggregator.gather(&snapshot(), &instances).await;

        assert_eq!(metrics.current_job_count, 8);
        assert!(sampler.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn bounded_fan_out_respects_limit() {
        let loads: Vec<(String, u64)> = (0..8).map(|n| (format!("i-{n}"), 2)).collect();
        let refs: Vec<(&str, u64)> = loads.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let sampler = ScriptedSampler::new(&refs);
        let aggregator = MetricsAggregator::new(sampler.clone()).with_max_concurrency(2);

        let instances: Vec<_> = loads.iter().map(|(id, _)| instance(id)).collect();
        let metrics = aggregator.gather(&snapshot(), &instances).await;

        assert_eq!(metrics.current_job_count, 16);
        assert_eq!(metrics.active_instances, 8);
        assert!(sampler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn age_of_future_launch_is_zero() {
        assert_eq!(age_secs(u64::MAX), 0);
    }
}
