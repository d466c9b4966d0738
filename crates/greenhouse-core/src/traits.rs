//! Collaborator contracts
//!
//! The control engine depends on these interfaces rather than on any
//! concrete platform client, store, or broker connection. The agent
//! binary supplies the real implementations.

use crate::device::DeviceSetting;
use crate::error::{ConnectorError, NotifyError, StoreError, TransportError};
use crate::sample::SensorSample;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A raw sample as delivered by the telemetry platform.
///
/// Either field may be absent; the synchronizer drops such samples.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fetches raw feed values from the external telemetry platform
#[async_trait]
pub trait TelemetryConnector: Send + Sync {
    /// Fetch all currently available raw samples for one feed.
    ///
    /// Zero samples is not an error.
    async fn fetch_feed(&self, feed: &str) -> Result<Vec<RawSample>, ConnectorError>;
}

/// Time-series persistence for sensor readings (append-only)
#[async_trait]
pub trait SensorStore: Send + Sync {
    /// Append one validated sample. Duplicate delivery is tolerated.
    async fn append(&self, sample: &SensorSample) -> Result<(), StoreError>;

    /// Latest persisted sample for every sensor that has one
    async fn latest_per_sensor(&self) -> Result<Vec<SensorSample>, StoreError>;

    /// All samples for one sensor within a time range
    async fn daily(
        &self,
        sensor: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorSample>, StoreError>;
}

/// Persistence for per-device settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// All device settings, in stable iteration order
    async fn all_settings(&self) -> Result<Vec<DeviceSetting>, StoreError>;

    /// Record a new actuator status for a device
    async fn update_status(&self, name: &str, status: bool) -> Result<(), StoreError>;
}

/// Pub/sub transport used to emit actuation commands
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Whether the transport is currently connected
    fn connected(&self) -> bool;

    /// Publish a single message on a channel
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;
}

/// Best-effort notification delivery on device state changes
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, category: &str, device: &str)
        -> Result<(), NotifyError>;
}
