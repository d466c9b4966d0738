//! Feed registry
//!
//! Static mapping between logical sensor/actuator names and the channels
//! they live on at the external telemetry platform.

use crate::sample::CanonicalSensor;

/// Sensor feeds synchronized from the telemetry platform
pub const SENSOR_FEEDS: [&str; 4] = ["thermal", "humid", "earth-humid", "light"];

/// Full channel path for a feed under an account-scoped prefix
#[must_use]
pub fn feed_topic(prefix: &str, feed: &str) -> String {
    format!("{prefix}/feeds/{feed}")
}

/// Canonical sensor for a feed key, if it is a sensor feed
#[must_use]
pub fn sensor_for_feed(feed: &str) -> Option<CanonicalSensor> {
    CanonicalSensor::from_feed_name(feed)
}
