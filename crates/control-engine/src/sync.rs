//! Sensor synchronizer
//!
//! Pulls newly available raw samples from the telemetry connector and
//! appends validated ones to the sensor store. Feeds are independent
//! failure domains: one feed's fetch or write failure never blocks or
//! fails another. Not exactly-once; the append-only store tolerates
//! repeated delivery.

use crate::error::ControlError;
use greenhouse_core::{SensorSample, SensorStore, TelemetryConnector};
use std::sync::Arc;

pub struct SensorSynchronizer {
    connector: Arc<dyn TelemetryConnector>,
    store: Arc<dyn SensorStore>,
    feeds: Vec<String>,
}

impl SensorSynchronizer {
    #[must_use]
    pub fn new(
        connector: Arc<dyn TelemetryConnector>,
        store: Arc<dyn SensorStore>,
        feeds: Vec<String>,
    ) -> Self {
        Self {
            connector,
            store,
            feeds,
        }
    }

    /// One synchronization pass: all feeds fetched and persisted
    /// concurrently.
    pub async fn sync_all(&self) {
        let passes = self.feeds.iter().map(|feed| self.sync_feed(feed));
        futures::future::join_all(passes).await;
    }

    /// Synchronize one feed. Errors are caught and logged here; nothing
    /// propagates.
    pub async fn sync_feed(&self, feed: &str) {
        if let Err(e) = self.try_sync_feed(feed).await {
            tracing::warn!("Sync failed for feed '{}': {}", feed, e);
        }
    }

    async fn try_sync_feed(&self, feed: &str) -> Result<(), ControlError> {
        let samples = self.connector.fetch_feed(feed).await?;

        for raw in samples {
            // Partial samples are dropped, not retried.
            let (Some(value), Some(created_at)) = (raw.value, raw.created_at) else {
                tracing::debug!("Skipping partial sample on feed '{}'", feed);
                continue;
            };

            let sample = SensorSample::new(feed, value, created_at);
            if let Err(e) = self.store.append(&sample).await {
                tracing::warn!("Failed to persist sample for feed '{}': {}", feed, e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use greenhouse_core::{ConnectorError, RawSample, StoreError};
    use std::sync::Mutex;

    struct FakeConnector {
        /// Feed name that fails every fetch
        failing: Option<String>,
    }

    #[async_trait]
    impl TelemetryConnector for FakeConnector {
        async fn fetch_feed(&self, feed: &str) -> Result<Vec<RawSample>, ConnectorError> {
            if self.failing.as_deref() == Some(feed) {
                return Err(ConnectorError::Http("boom".to_string()));
            }
            let ts = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
            Ok(vec![
                RawSample {
                    value: Some(42.0),
                    created_at: Some(ts),
                },
                // Partial samples that must be skipped
                RawSample {
                    value: None,
                    created_at: Some(ts),
                },
                RawSample {
                    value: Some(1.0),
                    created_at: None,
                },
            ])
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        appended: Mutex<Vec<SensorSample>>,
    }

    #[async_trait]
    impl SensorStore for RecordingStore {
        async fn append(&self, sample: &SensorSample) -> Result<(), StoreError> {
            self.appended.lock().unwrap().push(sample.clone());
            Ok(())
        }

        async fn latest_per_sensor(&self) -> Result<Vec<SensorSample>, StoreError> {
            Ok(Vec::new())
        }

        async fn daily(
            &self,
            _sensor: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<SensorSample>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn feeds() -> Vec<String> {
        ["thermal", "humid", "light"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[tokio::test]
    async fn one_failing_feed_does_not_block_the_others() {
        let store = Arc::new(RecordingStore::default());
        let sync = SensorSynchronizer::new(
            Arc::new(FakeConnector {
                failing: Some("humid".to_string()),
            }),
            store.clone(),
            feeds(),
        );

        sync.sync_all().await;

        let appended = store.appended.lock().unwrap();
        let sensors: Vec<&str> = appended.iter().map(|s| s.sensor.as_str()).collect();
        assert_eq!(sensors, vec!["thermal", "light"]);
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_as_a_connector_error() {
        let store = Arc::new(RecordingStore::default());
        let sync = SensorSynchronizer::new(
            Arc::new(FakeConnector {
                failing: Some("thermal".to_string()),
            }),
            store.clone(),
            vec!["thermal".to_string()],
        );

        let err = sync.try_sync_feed("thermal").await.unwrap_err();
        assert!(matches!(err, ControlError::Connector(_)));
        assert!(store.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_samples_are_dropped() {
        let store = Arc::new(RecordingStore::default());
        let sync = SensorSynchronizer::new(
            Arc::new(FakeConnector { failing: None }),
            store.clone(),
            vec!["thermal".to_string()],
        );

        sync.sync_all().await;

        let appended = store.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].value, 42.0);
    }
}
