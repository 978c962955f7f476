//! runnerscale-metrics — load observation for the runner fleet.
//!
//! Scrapes each runner's Prometheus endpoint for its current job count,
//! reduces the per-instance readings into fleet totals, and publishes the
//! controller's own metrics to a monitoring sink.
//!
//! # Architecture
//!
//! ```text
//! MetricsAggregator
//!   ├── one task per ResolvedInstance
//!   │   └── LoadSampler::sample() → InstanceSample
//!   └── ClusterMetrics::from_samples()
//!
//! MetricsPublisher
//!   ├── Clock::now() → invocation timestamp
//!   └── MetricSink::put_data_points()
//! ```
//!
//! A failed or timed-out sample degrades that instance to zero load and
//! marks it inactive; it never fails the aggregate.

pub mod aggregator;
pub mod clock;
pub mod exposition;
pub mod publisher;
pub mod sampler;

pub use aggregator::MetricsAggregator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use exposition::count_jobs;
pub use publisher::{
    DataPoint, MetricNames, MetricSink, MetricsPublisher, PublishError, TracingSink, Unit,
};
pub use sampler::{HttpLoadSampler, LoadSampler, SampleError};
