//! Error types for fleet inspection, resizing, and configuration.

use thiserror::Error;

/// Result type alias for fleet provider operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors raised by fleet providers and the inspection steps.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet not found: {0}")]
    NotFound(String),

    #[error("incomplete provider data: {0}")]
    IncompleteData(String),

    /// A scaling activity is running or the group is cooling down.
    #[error("scaling activity in progress: {0}")]
    ScalingActivityInProgress(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl FleetError {
    /// Whether the controller may swallow this error and finish the invocation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FleetError::ScalingActivityInProgress(_))
    }
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while building a `ControllerConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} not found")]
    Missing(&'static str),

    #[error("environment variable {key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
