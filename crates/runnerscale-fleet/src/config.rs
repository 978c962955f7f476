//! Controller configuration.
//!
//! Built once at process start from environment-style key/value pairs and
//! passed by reference into the pipeline. Required keys fail fast with a
//! `ConfigError` naming the key.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Port the runner exposes its Prometheus metrics on.
pub const DEFAULT_METRICS_PORT: u16 = 9252;

/// Per-instance sample timeout.
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Exposition line prefix of the runner's job gauge.
pub const DEFAULT_JOB_METRIC_PREFIX: &str = "gitlab_runner_jobs{";

/// Immutable settings for one controller process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub autoscaling_group_name: String,
    pub metric_namespace: String,
    pub job_count_metric_name: String,
    pub target_capacity_metric_name: String,
    pub actual_capacity_metric_name: String,
    /// Jobs a single runner can execute at once.
    pub concurrent_jobs_per_runner: NonZeroU32,
    /// New jobs the fleet should absorb before another scaling event.
    pub job_headroom_before_scaling: u32,
    pub metrics_port: u16,
    pub sample_timeout: Duration,
    pub job_metric_prefix: String,
    /// Upper bound on concurrent samples; `None` samples every instance at once.
    pub max_concurrent_samples: Option<usize>,
}

impl ControllerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> ConfigResult<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(ConfigError::Missing(key)),
            }
        };
        let optional = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let concurrent_jobs_per_runner = parse::<NonZeroU32>(
            "MAXIMUM_CONCURRENT_JOBS_PER_RUNNER",
            &required("MAXIMUM_CONCURRENT_JOBS_PER_RUNNER")?,
        )?;
        let job_headroom_before_scaling = parse::<u32>(
            "COUNT_OF_NEW_JOBS_BEFORE_SCALING",
            &required("COUNT_OF_NEW_JOBS_BEFORE_SCALING")?,
        )?;

        let metrics_port = match optional("RUNNER_METRICS_PORT") {
            Some(v) => parse::<u16>("RUNNER_METRICS_PORT", &v)?,
            None => DEFAULT_METRICS_PORT,
        };
        let sample_timeout = match optional("RUNNER_SAMPLE_TIMEOUT_SECS") {
            Some(v) => {
                let secs = parse::<NonZeroU32>("RUNNER_SAMPLE_TIMEOUT_SECS", &v)?;
                Duration::from_secs(u64::from(secs.get()))
            }
            None => DEFAULT_SAMPLE_TIMEOUT,
        };
        let max_concurrent_samples = match optional("RUNNER_MAX_CONCURRENT_SAMPLES") {
            Some(v) => Some(parse::<NonZeroU32>("RUNNER_MAX_CONCURRENT_SAMPLES", &v)?.get() as usize),
            None => None,
        };

        Ok(Self {
            autoscaling_group_name: required("AUTOSCALING_GROUP_NAME")?,
            metric_namespace: required("RUNNER_METRIC_NAMESPACE")?,
            job_count_metric_name: required("RUNNER_JOB_COUNT_METRIC_NAME")?,
            target_capacity_metric_name: required("RUNNER_TARGET_CAPACITY_METRIC_NAME")?,
            actual_capacity_metric_name: required("RUNNER_ACTUAL_CAPACITY_METRIC_NAME")?,
            concurrent_jobs_per_runner,
            job_headroom_before_scaling,
            metrics_port,
            sample_timeout,
            job_metric_prefix: optional("RUNNER_JOB_METRIC_PREFIX")
                .unwrap_or_else(|| DEFAULT_JOB_METRIC_PREFIX.to_string()),
            max_concurrent_samples,
        })
    }
}

fn parse<T>(key: &'static str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{value:?}: {e}"),
    })
}
