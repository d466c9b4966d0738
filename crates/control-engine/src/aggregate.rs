//! Time-bucket aggregation for daily reports
//!
//! Turns one day of irregularly-timed raw samples into one
//! representative value per target hour using nearest-neighbour-in-time
//! selection. Intentionally approximate: each bucket gets whatever
//! reading was closest, which may be gapped by hours if the sensor
//! briefly stopped reporting. Report parity depends on keeping it this
//! way, so no interpolation.

use chrono::{DateTime, Utc};
use greenhouse_core::{CanonicalSensor, SensorSample, SensorStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;

/// Hours of day the daily dashboard reports on
pub const TARGET_HOURS: [f64; 7] = [8.0, 9.0, 12.0, 15.0, 18.0, 20.0, 23.0];

/// One aggregated bucket: the target hour and the nearest reading, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPoint {
    /// Target time-of-day label
    pub label: String,
    /// Nearest reading rounded to the nearest integer; absent when the
    /// day had no samples
    pub value: Option<i64>,
}

/// Aggregate one sensor's day of samples into one point per target hour.
///
/// Target hours may be fractional (hour + minutes/60). Output order
/// follows the input target-hour order exactly.
#[must_use]
pub fn aggregate_daily(samples: &[SensorSample], target_hours: &[f64]) -> Vec<AggregatedPoint> {
    if samples.is_empty() {
        return target_hours
            .iter()
            .map(|&hour| AggregatedPoint {
                label: hour_label(hour),
                value: None,
            })
            .collect();
    }

    let mut sorted: Vec<&SensorSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);

    let mut points = Vec::with_capacity(target_hours.len());
    for &hour in target_hours {
        let mut closest: Option<&SensorSample> = None;
        let mut min_diff = f64::INFINITY;

        for &sample in &sorted {
            let time_value = sample.hour_of_day();
            let diff = (time_value - hour).abs();
            if diff < min_diff {
                min_diff = diff;
                closest = Some(sample);
            }
            // Samples are sorted; once past the bucket by more than an
            // hour nothing closer remains.
            if time_value > hour + 1.0 && closest.is_some() {
                break;
            }
        }

        points.push(AggregatedPoint {
            label: hour_label(hour),
            value: closest.map(|s| s.value.round() as i64),
        });
    }
    points
}

/// Aggregated daily series for every sensor, keyed by report name.
///
/// Reporting path only; read failures propagate to the caller.
pub async fn daily_report(
    store: &dyn SensorStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<HashMap<&'static str, Vec<AggregatedPoint>>, StoreError> {
    let mut report = HashMap::new();
    for sensor in CanonicalSensor::ALL {
        let rows = store.daily(sensor.feed_key(), start, end).await?;
        report.insert(sensor.report_key(), aggregate_daily(&rows, &TARGET_HOURS));
    }
    Ok(report)
}

fn hour_label(hour: f64) -> String {
    if hour.fract() == 0.0 {
        format!("{}", hour as i64)
    } else {
        format!("{hour}")
    }
}
