//! Error types for the control engine

use greenhouse_core::{ConnectorError, MissingFeatures, StoreError, TransportError};
use thiserror::Error;

/// Failure of a single external prediction invocation
#[derive(Error, Debug)]
pub enum InvocationError {
    /// The inference process could not be started
    #[error("failed to launch inference process: {0}")]
    Launch(#[from] std::io::Error),

    /// The inference process exited with a non-zero code
    #[error("inference process exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    /// The inference process produced no usable output
    #[error("inference process returned no prediction: {stderr}")]
    EmptyOutput { stderr: String },

    /// The invocation did not complete within the configured bound
    #[error("inference invocation timed out")]
    Timeout,
}

/// Errors that can occur in the control engine.
///
/// All variants are caught and logged at the boundary of the unit they
/// occur in (per-feed sync, per-device decision); none propagate to
/// stop the periodic schedules.
#[derive(Error, Debug)]
pub enum ControlError {
    /// A required sensor reading was missing for a device this tick
    #[error(transparent)]
    Validation(#[from] MissingFeatures),

    /// Telemetry fetch failed for a feed
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// External prediction invocation failed for a device
    #[error("invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// Pub/sub transport refused or failed the actuation publish
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Read or write against a persistence collaborator failed
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}
