//! Error types for the collaborator contracts

use thiserror::Error;

/// Errors from the external telemetry connector
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// HTTP request failed (network, status code)
    #[error("telemetry request failed: {0}")]
    Http(String),

    /// Response could not be decoded
    #[error("malformed telemetry payload: {0}")]
    Malformed(String),

    /// Fetch did not complete in time
    #[error("telemetry fetch timed out")]
    Timeout,
}

/// Errors from the persistence collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    /// Read against the store failed
    #[error("store read failed: {0}")]
    Read(String),

    /// Write against the store failed
    #[error("store write failed: {0}")]
    Write(String),

    /// IO error (file-backed stores)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the pub/sub transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Transport is not currently connected
    #[error("transport not connected")]
    NotConnected,

    /// Publish was attempted and failed
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Errors from the notification side-channel
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}
