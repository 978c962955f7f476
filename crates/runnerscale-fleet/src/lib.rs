//! runnerscale-fleet — the fleet model for the runner autoscaler.
//!
//! Holds the domain types that flow through one controller invocation,
//! the provider capability traits the controller talks to, and the two
//! inspection steps that turn raw provider answers into typed snapshots.
//!
//! # Architecture
//!
//! ```text
//! FleetApi ──────► FleetInspector ────► FleetSnapshot
//!                                          │ countable ids
//! InstanceApi ───► InstanceResolver ◄──────┘
//!                        │
//!                        ▼
//!               Vec<ResolvedInstance>
//! ```
//!
//! `InMemoryFleet` implements both provider traits and is used for tests
//! and for dry runs driven by a TOML inventory file.

pub mod config;
pub mod error;
pub mod inspector;
pub mod memory;
pub mod provider;
pub mod types;

pub use config::ControllerConfig;
pub use error::{ConfigError, ConfigResult, FleetError, FleetResult};
pub use inspector::{FleetInspector, InstanceResolver};
pub use memory::{InMemoryFleet, Inventory, ResizeCall};
pub use provider::{FleetApi, InstanceApi};
pub use types::*;
