//! runnerscale-autoscale — job-driven runner fleet scaling.
//!
//! One controller invocation walks a fixed pipeline and then applies the
//! decision. Nothing is carried between invocations; the provider's
//! cooldown guard is the only state that spans them.
//!
//! # Scaling Algorithm
//!
//! ```text
//! raw     = ceil((current_job_count + job_headroom) / concurrent_jobs_per_runner)
//! desired = clamp(raw, min_instances, max_instances)
//!
//! desired == current  → no request
//! desired >  current  → set_desired_capacity(desired, honor_cooldown = false)
//! desired <  current  → set_desired_capacity(desired, honor_cooldown = true)
//! ```
//!
//! A resize rejected because a scaling activity is in progress (or the
//! group is cooling down) is logged and the invocation still succeeds.

pub mod actuator;
pub mod controller;
pub mod error;
pub mod policy;

pub use actuator::{ScaleAction, ScalingActuator};
pub use controller::{Controller, InvocationReport};
pub use error::{ControllerError, ControllerResult};
pub use policy::{CapacityPolicy, ScalingDecision};
