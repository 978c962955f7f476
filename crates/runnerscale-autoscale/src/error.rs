//! Controller error types.

use thiserror::Error;

use runnerscale_fleet::FleetError;
use runnerscale_metrics::PublishError;

/// Fatal failures of one controller invocation.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("fleet error: {0}")]
    Fleet(#[from] FleetError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
