//! Greenhouse domain model
//!
//! Sensor samples, controllable device descriptors, the feed registry,
//! and the collaborator contracts (telemetry, persistence, pub/sub,
//! notifications) that the control engine is wired against.

pub mod device;
pub mod error;
pub mod feeds;
pub mod sample;
pub mod traits;

pub use device::{DeviceKind, DeviceSetting, FeatureVector, MissingFeatures, Mode};
pub use error::{ConnectorError, NotifyError, StoreError, TransportError};
pub use sample::{CanonicalSensor, SensorSample, SensorSnapshot};
pub use traits::{Notifier, PubSubTransport, RawSample, SensorStore, SettingsStore, TelemetryConnector};
