//! Controllable device descriptors
//!
//! Each device kind is a closed variant carrying its prediction
//! descriptor: the feature keys its inference model requires, the
//! control feed it is actuated over, and the rule for decoding the
//! model's textual output into an on/off status.

use crate::sample::{CanonicalSensor, SensorSnapshot};
use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Affirmative token emitted by the fan and pump inference scripts ("ON")
pub const AFFIRMATIVE_TOKEN: &str = "BẬT";

/// The controllable greenhouse devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Fan,
    Led,
    Pump,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Fan, DeviceKind::Led, DeviceKind::Pump];

    /// Resolve a persisted device name to a kind
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fan" => Some(Self::Fan),
            "led" => Some(Self::Led),
            "pump" => Some(Self::Pump),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Fan => "fan",
            Self::Led => "led",
            Self::Pump => "pump",
        }
    }

    /// Feature keys the kind's inference model requires.
    ///
    /// The exact strings are the wire contract with the external
    /// inference scripts and must not be normalized.
    #[must_use]
    pub fn required_features(self) -> &'static [&'static str] {
        match self {
            Self::Fan => &["temperature", "humidity"],
            Self::Led => &["Light_Intensity", "Temperature", "Humidity", "Minute_Of_Day"],
            Self::Pump => &["Soil Moisture", "Temperature", "Air humidity (%)"],
        }
    }

    /// Control feed suffix this kind is actuated over
    #[must_use]
    pub fn control_feed(self) -> &'static str {
        match self {
            Self::Fan => "fan-control",
            Self::Pump => "water-pump",
            Self::Led => "light-control",
        }
    }

    /// Decode the inference program's trimmed output into an on/off status.
    ///
    /// Led models print an integer class label; fan and pump models print
    /// a localized ON/OFF token. Anything unrecognized decodes to off.
    #[must_use]
    pub fn decode_prediction(self, output: &str) -> bool {
        let output = output.trim();
        match self {
            Self::Led => output.parse::<i64>().map(|v| v == 1).unwrap_or(false),
            Self::Fan | Self::Pump => output == AFFIRMATIVE_TOKEN,
        }
    }

    /// Build the kind's feature vector from the latest sensor snapshot.
    ///
    /// Every required key is supplied or the call fails listing what was
    /// missing; a partial vector is never produced.
    pub fn feature_vector(
        self,
        snapshot: &SensorSnapshot,
        now: DateTime<Local>,
    ) -> Result<FeatureVector, MissingFeatures> {
        use CanonicalSensor::{EarthHumid, Humid, Light, Thermal};

        let mut features = FeatureVector::new();
        let mut missing = Vec::new();
        let mut require = |key: &'static str, sensor: CanonicalSensor| match snapshot.value(sensor) {
            Some(value) => features.push_number(key, value),
            None => missing.push(key),
        };

        match self {
            Self::Fan => {
                require("temperature", Thermal);
                require("humidity", Humid);
            }
            Self::Led => {
                require("Light_Intensity", Light);
                require("Temperature", Thermal);
                require("Humidity", Humid);
                // Minutes since local midnight, 0-1439
                let minute_of_day = now.hour() * 60 + now.minute();
                features.push_integer("Minute_Of_Day", i64::from(minute_of_day));
            }
            Self::Pump => {
                require("Soil Moisture", EarthHumid);
                require("Temperature", Thermal);
                require("Air humidity (%)", Humid);
            }
        }

        if missing.is_empty() {
            Ok(features)
        } else {
            Err(MissingFeatures {
                device: self,
                missing,
            })
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A required sensor reading was absent from the snapshot
#[derive(Error, Debug)]
#[error("missing required inputs for {device}: {missing:?}")]
pub struct MissingFeatures {
    pub device: DeviceKind,
    pub missing: Vec<&'static str>,
}

/// Per-device operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// A human controls the device; the engine leaves it alone
    Manual,
    /// The decision engine controls the device
    Automatic,
}

/// Persisted per-device setting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSetting {
    /// Device name as persisted (matches `DeviceKind::name` for known kinds)
    pub name: String,
    /// Who controls the device
    pub mode: Mode,
    /// Last status sent to the real actuator
    pub status: bool,
}

impl DeviceSetting {
    #[must_use]
    pub fn kind(&self) -> Option<DeviceKind> {
        DeviceKind::from_name(&self.name)
    }
}

/// Named numeric inputs for one prediction call.
///
/// Only constructed through [`DeviceKind::feature_vector`], so a value of
/// this type always carries every key its device kind requires.
#[derive(Debug, Clone, Default)]
pub struct FeatureVector {
    entries: Map<String, Value>,
}

impl FeatureVector {
    fn new() -> Self {
        Self::default()
    }

    fn push_number(&mut self, key: &str, value: f64) {
        self.entries.insert(
            key.to_string(),
            Value::from(value),
        );
    }

    fn push_integer(&mut self, key: &str, value: i64) {
        self.entries.insert(key.to_string(), Value::from(value));
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as the JSON object passed to the inference process
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.entries.clone()).to_string()
    }
}
