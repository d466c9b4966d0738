//! Sensor sample representation

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A persisted sensor reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSample {
    /// Canonical sensor feed key this reading belongs to
    pub sensor: String,
    /// Measured value
    pub value: f64,
    /// When the reading was produced
    pub timestamp: DateTime<Utc>,
}

impl SensorSample {
    #[must_use]
    pub fn new(sensor: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor: sensor.into(),
            value,
            timestamp,
        }
    }

    /// Time of day as fractional hours (hour + minute/60)
    #[must_use]
    pub fn hour_of_day(&self) -> f64 {
        f64::from(self.timestamp.hour()) + f64::from(self.timestamp.minute()) / 60.0
    }
}

/// The greenhouse sensor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalSensor {
    /// Air temperature
    Thermal,
    /// Air humidity
    Humid,
    /// Soil moisture
    EarthHumid,
    /// Light intensity
    Light,
}

impl CanonicalSensor {
    pub const ALL: [CanonicalSensor; 4] = [
        CanonicalSensor::Thermal,
        CanonicalSensor::Humid,
        CanonicalSensor::EarthHumid,
        CanonicalSensor::Light,
    ];

    /// Translate a telemetry-layer sensor name to its canonical key.
    ///
    /// Accepts both the raw platform names (`temperature`, `humidity`,
    /// `soil-moisture`, `light`) and the canonical feed keys themselves.
    #[must_use]
    pub fn from_feed_name(name: &str) -> Option<Self> {
        match name {
            "temperature" | "thermal" => Some(Self::Thermal),
            "humidity" | "humid" => Some(Self::Humid),
            "soil-moisture" | "earth-humid" => Some(Self::EarthHumid),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    /// Canonical feed key used by telemetry and persistence
    #[must_use]
    pub fn feed_key(self) -> &'static str {
        match self {
            Self::Thermal => "thermal",
            Self::Humid => "humid",
            Self::EarthHumid => "earth-humid",
            Self::Light => "light",
        }
    }

    /// Key used in daily report output
    #[must_use]
    pub fn report_key(self) -> &'static str {
        match self {
            Self::Thermal => "temperature",
            Self::Humid => "humidity",
            Self::EarthHumid => "soil_moisture",
            Self::Light => "light",
        }
    }
}

/// Latest reading per sensor, keyed by canonical name.
///
/// Derived on demand from the latest-per-sensor rows; rows whose sensor
/// name does not translate are dropped.
#[derive(Debug, Clone, Default)]
pub struct SensorSnapshot {
    latest: HashMap<CanonicalSensor, SensorSample>,
}

impl SensorSnapshot {
    /// Build a snapshot from latest-per-sensor rows
    #[must_use]
    pub fn from_latest(rows: Vec<SensorSample>) -> Self {
        let mut latest = HashMap::new();
        for row in rows {
            match CanonicalSensor::from_feed_name(&row.sensor) {
                Some(key) => {
                    latest.insert(key, row);
                }
                None => {
                    tracing::debug!("Ignoring reading from unknown sensor '{}'", row.sensor);
                }
            }
        }
        Self { latest }
    }

    #[must_use]
    pub fn get(&self, sensor: CanonicalSensor) -> Option<&SensorSample> {
        self.latest.get(&sensor)
    }

    /// Value for a sensor, if a reading is present
    #[must_use]
    pub fn value(&self, sensor: CanonicalSensor) -> Option<f64> {
        self.latest.get(&sensor).map(|s| s.value)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(sensor: &str, value: f64) -> SensorSample {
        SensorSample::new(
            sensor,
            value,
            Utc.with_ymd_and_hms(2024, 5, 10, 8, 30, 0).unwrap(),
        )
    }

    #[test]
    fn translates_raw_and_canonical_names() {
        assert_eq!(
            CanonicalSensor::from_feed_name("temperature"),
            Some(CanonicalSensor::Thermal)
        );
        assert_eq!(
            CanonicalSensor::from_feed_name("thermal"),
            Some(CanonicalSensor::Thermal)
        );
        assert_eq!(
            CanonicalSensor::from_feed_name("soil-moisture"),
            Some(CanonicalSensor::EarthHumid)
        );
        assert_eq!(
            CanonicalSensor::from_feed_name("humidity"),
            Some(CanonicalSensor::Humid)
        );
        assert_eq!(
            CanonicalSensor::from_feed_name("light"),
            Some(CanonicalSensor::Light)
        );
        assert_eq!(CanonicalSensor::from_feed_name("co2"), None);
    }

    #[test]
    fn snapshot_keeps_known_sensors_and_drops_unknown() {
        let snap = SensorSnapshot::from_latest(vec![
            sample("temperature", 28.0),
            sample("humid", 61.0),
            sample("co2", 410.0),
        ]);
        assert_eq!(snap.value(CanonicalSensor::Thermal), Some(28.0));
        assert_eq!(snap.value(CanonicalSensor::Humid), Some(61.0));
        assert_eq!(snap.value(CanonicalSensor::Light), None);
    }

    #[test]
    fn hour_of_day_is_fractional() {
        let s = sample("thermal", 1.0);
        assert!((s.hour_of_day() - 8.5).abs() < f64::EPSILON);
    }
}
