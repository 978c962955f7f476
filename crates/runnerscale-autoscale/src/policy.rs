//! Capacity policy: job count to desired runner count.
//!
//! ```text
//! desired = clamp(ceil((jobs + headroom) / jobs_per_runner), min, max)
//! ```

use std::num::NonZeroU32;

use runnerscale_fleet::{ClusterMetrics, ControllerConfig};

/// The capacity chosen for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingDecision {
    pub desired_capacity: u32,
}

/// Sizing parameters for the fleet.
///
/// `concurrent_jobs_per_runner` is non-zero by construction; a zero value
/// is rejected when the configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPolicy {
    concurrent_jobs_per_runner: NonZeroU32,
    job_headroom_before_scaling: u32,
}

impl CapacityPolicy {
    pub fn new(concurrent_jobs_per_runner: NonZeroU32, job_headroom_before_scaling: u32) -> Self {
        Self {
            concurrent_jobs_per_runner,
            job_headroom_before_scaling,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.concurrent_jobs_per_runner,
            config.job_headroom_before_scaling,
        )
    }

    /// Runners needed for `job_count` plus headroom, before clamping.
    pub fn required_runners(&self, job_count: u64) -> u64 {
        job_count
            .saturating_add(u64::from(self.job_headroom_before_scaling))
            .div_ceil(u64::from(self.concurrent_jobs_per_runner.get()))
    }

    /// Desired capacity clamped to `[min, max]`.
    ///
    /// Callers guarantee `min <= max`; if not, `max` wins.
    pub fn desired_capacity(&self, job_count: u64, min: u32, max: u32) -> u32 {
        let raw = u32::try_from(self.required_runners(job_count)).unwrap_or(u32::MAX);
        raw.max(min).min(max)
    }

    /// Decide the capacity for the given fleet totals.
    pub fn decide(&self, metrics: &ClusterMetrics) -> ScalingDecision {
        ScalingDecision {
            desired_capacity: self.desired_capacity(
                metrics.current_job_count,
                metrics.min_instances,
                metrics.max_instances,
            ),
        }
    }
}
