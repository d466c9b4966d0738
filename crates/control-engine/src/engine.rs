//! Automation decision engine
//!
//! Once per control tick: load current device settings and the latest
//! sensor snapshot, build per-device feature vectors, consult the
//! prediction invoker, and on a predicted state change publish the
//! actuation command, persist the new status, and emit a best-effort
//! notification. Devices are independent failure domains within a tick.

use crate::error::ControlError;
use crate::predictor::Predictor;
use crate::publisher::ActuationPublisher;
use chrono::Local;
use dashmap::DashMap;
use greenhouse_core::{
    DeviceKind, DeviceSetting, Mode, Notifier, SensorSnapshot, SensorStore, SettingsStore,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the decision engine
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// A device was switched to a new status
    Switched { device: DeviceKind, status: bool },
    /// A device's evaluation failed this tick
    DeviceFailed { device: DeviceKind, error: String },
}

pub struct DecisionEngine {
    settings: Arc<dyn SettingsStore>,
    sensors: Arc<dyn SensorStore>,
    predictor: Arc<dyn Predictor>,
    publisher: ActuationPublisher,
    notifier: Option<Arc<dyn Notifier>>,
    /// Devices whose previous evaluation has not finished yet.
    /// A slow prediction must not lead to duplicate commands when ticks
    /// overlap.
    in_flight: DashMap<DeviceKind, ()>,
    event_tx: broadcast::Sender<ControlEvent>,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        sensors: Arc<dyn SensorStore>,
        predictor: Arc<dyn Predictor>,
        publisher: ActuationPublisher,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            settings,
            sensors,
            predictor,
            publisher,
            notifier,
            in_flight: DashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to engine events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.event_tx.subscribe()
    }

    /// Run one decision tick.
    ///
    /// Load failures and an empty sensor set abort the tick with zero
    /// side effects; per-device failures only skip that device.
    pub async fn tick(&self) {
        let settings = match self.settings.all_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Control tick aborted, settings read failed: {}", e);
                return;
            }
        };

        let latest = match self.sensors.latest_per_sensor().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!("Control tick aborted, sensor read failed: {}", e);
                return;
            }
        };
        if latest.is_empty() {
            tracing::debug!("Control tick skipped, no sensor data yet");
            return;
        }
        let snapshot = SensorSnapshot::from_latest(latest);

        for setting in &settings {
            if setting.mode != Mode::Automatic {
                continue;
            }
            let Some(kind) = setting.kind() else {
                tracing::debug!("No automation for unknown device '{}'", setting.name);
                continue;
            };

            if self.in_flight.insert(kind, ()).is_some() {
                tracing::warn!("{} evaluation still in flight, skipping this tick", kind);
                continue;
            }
            let result = self.evaluate_device(kind, setting, &snapshot).await;
            self.in_flight.remove(&kind);

            match result {
                Ok(()) => {}
                // A missing reading only means this device sits the
                // tick out.
                Err(ControlError::Validation(e)) => {
                    tracing::debug!("{}", e);
                }
                Err(e) => {
                    tracing::warn!("Auto control failed for {}: {}", kind, e);
                    let _ = self.event_tx.send(ControlEvent::DeviceFailed {
                        device: kind,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Read-decide-act sequence for one device
    async fn evaluate_device(
        &self,
        kind: DeviceKind,
        setting: &DeviceSetting,
        snapshot: &SensorSnapshot,
    ) -> Result<(), ControlError> {
        let features = kind.feature_vector(snapshot, Local::now())?;
        let raw = self.predictor.predict(kind, &features).await?;
        let predicted = kind.decode_prediction(&raw);

        // The persisted status reflects the last command actually sent;
        // never re-emit for a state already set.
        if predicted == setting.status {
            return Ok(());
        }

        tracing::info!(
            "{} switching {} -> {}",
            kind,
            setting.status,
            predicted
        );

        // Publish first; a failed actuation must leave the persisted
        // state untouched.
        self.publisher.publish_status(kind, predicted).await?;

        if let Err(e) = self.settings.update_status(&setting.name, predicted).await {
            // The actuator switched but the status was not recorded;
            // the next tick re-reads the stale status and re-converges.
            tracing::error!(
                "State divergence: {} actuated to {} but status write failed: {}",
                kind,
                predicted,
                e
            );
            return Err(e.into());
        }

        let _ = self.event_tx.send(ControlEvent::Switched {
            device: kind,
            status: predicted,
        });

        if let Some(notifier) = &self.notifier {
            let message = format!(
                "{} auto switched {}",
                kind,
                if predicted { "ON" } else { "OFF" }
            );
            if let Err(e) = notifier.notify(&message, "AUTO_CONTROL", kind.name()).await {
                tracing::warn!("Notification for {} not delivered: {}", kind, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvocationError;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use greenhouse_core::{
        FeatureVector, NotifyError, PubSubTransport, SensorSample, StoreError, TransportError,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSettings {
        rows: Vec<DeviceSetting>,
        fail_reads: bool,
        fail_writes: bool,
        updates: Mutex<Vec<(String, bool)>>,
    }

    impl FakeSettings {
        fn with(rows: Vec<DeviceSetting>) -> Self {
            Self {
                rows,
                fail_reads: false,
                fail_writes: false,
                updates: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SettingsStore for FakeSettings {
        async fn all_settings(&self) -> Result<Vec<DeviceSetting>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Read("down".to_string()));
            }
            Ok(self.rows.clone())
        }

        async fn update_status(&self, name: &str, status: bool) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Write("down".to_string()));
            }
            self.updates.lock().unwrap().push((name.to_string(), status));
            Ok(())
        }
    }

    struct FakeSensors {
        rows: Vec<SensorSample>,
    }

    #[async_trait]
    impl SensorStore for FakeSensors {
        async fn append(&self, _sample: &SensorSample) -> Result<(), StoreError> {
            Ok(())
        }

        async fn latest_per_sensor(&self) -> Result<Vec<SensorSample>, StoreError> {
            Ok(self.rows.clone())
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

    struct FakePredictor {
        /// Per-kind canned output; missing kind fails the invocation
        outputs: HashMap<DeviceKind, String>,
        calls: AtomicUsize,
    }

    impl FakePredictor {
        fn answering(outputs: &[(DeviceKind, &str)]) -> Self {
            Self {
                outputs: outputs
                    .iter()
                    .map(|(k, v)| (*k, (*v).to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Predictor for FakePredictor {
        async fn predict(
            &self,
            kind: DeviceKind,
            _features: &FeatureVector,
        ) -> Result<String, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outputs
                .get(&kind)
                .cloned()
                .ok_or(InvocationError::EmptyOutput {
                    stderr: "model blew up".to_string(),
                })
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        down: bool,
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PubSubTransport for FakeTransport {
        fn connected(&self) -> bool {
            !self.down
        }

        async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlakyNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(
            &self,
            _message: &str,
            _category: &str,
            _device: &str,
        ) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Delivery("mailbox full".to_string()))
        }
    }

    fn setting(name: &str, mode: Mode, status: bool) -> DeviceSetting {
        DeviceSetting {
            name: name.to_string(),
            mode,
            status,
        }
    }

    fn all_sensor_rows() -> Vec<SensorSample> {
        let ts = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        vec![
            SensorSample::new("thermal", 33.0, ts),
            SensorSample::new("humid", 48.0, ts),
            SensorSample::new("earth-humid", 21.0, ts),
            SensorSample::new("light", 700.0, ts),
        ]
    }

    struct Harness {
        settings: Arc<FakeSettings>,
        transport: Arc<FakeTransport>,
        predictor: Arc<FakePredictor>,
        engine: DecisionEngine,
    }

    fn harness(
        settings: FakeSettings,
        sensors: Vec<SensorSample>,
        predictor: FakePredictor,
        transport: FakeTransport,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Harness {
        let settings = Arc::new(settings);
        let transport = Arc::new(transport);
        let predictor = Arc::new(predictor);
        let engine = DecisionEngine::new(
            settings.clone(),
            Arc::new(FakeSensors { rows: sensors }),
            predictor.clone(),
            ActuationPublisher::new(transport.clone(), "grower"),
            notifier,
        );
        Harness {
            settings,
            transport,
            predictor,
            engine,
        }
    }

    #[tokio::test]
    async fn unchanged_prediction_causes_no_side_effects() {
        let h = harness(
            FakeSettings::with(vec![setting("fan", Mode::Automatic, true)]),
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport::default(),
            None,
        );

        h.engine.tick().await;

        assert_eq!(h.predictor.calls.load(Ordering::SeqCst), 1);
        assert!(h.transport.published.lock().unwrap().is_empty());
        assert!(h.settings.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn changed_prediction_publishes_once_then_persists_once() {
        let h = harness(
            FakeSettings::with(vec![setting("fan", Mode::Automatic, false)]),
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport::default(),
            None,
        );
        let mut events = h.engine.subscribe();

        h.engine.tick().await;

        assert_eq!(
            *h.transport.published.lock().unwrap(),
            vec![("grower/feeds/fan-control".to_string(), "1".to_string())]
        );
        assert_eq!(
            *h.settings.updates.lock().unwrap(),
            vec![("fan".to_string(), true)]
        );
        assert!(matches!(
            events.try_recv(),
            Ok(ControlEvent::Switched {
                device: DeviceKind::Fan,
                status: true
            })
        ));
    }

    #[tokio::test]
    async fn missing_sensor_skips_the_device_without_predicting() {
        // Pump needs soil moisture; only air readings are present.
        let ts = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let h = harness(
            FakeSettings::with(vec![setting("pump", Mode::Automatic, false)]),
            vec![
                SensorSample::new("thermal", 33.0, ts),
                SensorSample::new("humid", 48.0, ts),
            ],
            FakePredictor::answering(&[(DeviceKind::Pump, "BẬT")]),
            FakeTransport::default(),
            None,
        );

        h.engine.tick().await;

        assert_eq!(h.predictor.calls.load(Ordering::SeqCst), 0);
        assert!(h.transport.published.lock().unwrap().is_empty());
        assert!(h.settings.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_read_failure_aborts_the_tick() {
        let mut settings = FakeSettings::with(vec![setting("fan", Mode::Automatic, false)]);
        settings.fail_reads = true;
        let h = harness(
            settings,
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport::default(),
            None,
        );

        h.engine.tick().await;

        assert_eq!(h.predictor.calls.load(Ordering::SeqCst), 0);
        assert!(h.transport.published.lock().unwrap().is_empty());
        assert!(h.settings.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_sensor_set_aborts_the_tick() {
        let h = harness(
            FakeSettings::with(vec![setting("fan", Mode::Automatic, false)]),
            Vec::new(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport::default(),
            None,
        );

        h.engine.tick().await;

        assert_eq!(h.predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disconnected_transport_leaves_the_setting_unpersisted() {
        let h = harness(
            FakeSettings::with(vec![setting("fan", Mode::Automatic, false)]),
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport {
                down: true,
                ..FakeTransport::default()
            },
            None,
        );

        h.engine.tick().await;

        assert!(h.transport.published.lock().unwrap().is_empty());
        assert!(h.settings.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failing_device_does_not_stop_the_others() {
        // Fan has no canned output so its invocation fails; pump still
        // switches.
        let h = harness(
            FakeSettings::with(vec![
                setting("fan", Mode::Automatic, false),
                setting("pump", Mode::Automatic, false),
            ]),
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Pump, "BẬT")]),
            FakeTransport::default(),
            None,
        );

        h.engine.tick().await;

        assert_eq!(
            *h.settings.updates.lock().unwrap(),
            vec![("pump".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn manual_devices_are_left_alone() {
        let h = harness(
            FakeSettings::with(vec![setting("fan", Mode::Manual, false)]),
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport::default(),
            None,
        );

        h.engine.tick().await;

        assert_eq!(h.predictor.calls.load(Ordering::SeqCst), 0);
        assert!(h.transport.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_is_swallowed_after_persisting() {
        let notifier = Arc::new(FlakyNotifier::default());
        let h = harness(
            FakeSettings::with(vec![setting("led", Mode::Automatic, false)]),
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Led, "1")]),
            FakeTransport::default(),
            Some(notifier.clone()),
        );

        h.engine.tick().await;

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *h.settings.updates.lock().unwrap(),
            vec![("led".to_string(), true)]
        );
    }

    /// Blocks inside `predict` until released, so a tick can be held
    /// mid-evaluation while another tick runs.
    struct BlockingPredictor {
        entered: Arc<tokio::sync::Notify>,
        gate: Arc<tokio::sync::Notify>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Predictor for BlockingPredictor {
        async fn predict(
            &self,
            _kind: DeviceKind,
            _features: &FeatureVector,
        ) -> Result<String, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.gate.notified().await;
            Ok("BẬT".to_string())
        }
    }

    #[tokio::test]
    async fn device_still_in_flight_is_skipped_by_an_overlapping_tick() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let gate = Arc::new(tokio::sync::Notify::new());
        let predictor = Arc::new(BlockingPredictor {
            entered: entered.clone(),
            gate: gate.clone(),
            calls: AtomicUsize::new(0),
        });
        let settings = Arc::new(FakeSettings::with(vec![setting(
            "fan",
            Mode::Automatic,
            false,
        )]));
        let transport = Arc::new(FakeTransport::default());
        let engine = Arc::new(DecisionEngine::new(
            settings.clone(),
            Arc::new(FakeSensors {
                rows: all_sensor_rows(),
            }),
            predictor.clone(),
            ActuationPublisher::new(transport.clone(), "grower"),
            None,
        ));

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.tick().await }
        });
        // Wait until the first tick is inside the fan's prediction.
        entered.notified().await;

        // A second tick fires while the evaluation is in flight; the fan
        // must be skipped, not predicted again.
        engine.tick().await;
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        first.await.unwrap();

        // Only the first tick's evaluation produced side effects.
        assert_eq!(transport.published.lock().unwrap().len(), 1);
        assert_eq!(
            *settings.updates.lock().unwrap(),
            vec![("fan".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn persistence_write_failure_surfaces_as_device_failure() {
        let mut settings = FakeSettings::with(vec![setting("fan", Mode::Automatic, false)]);
        settings.fail_writes = true;
        let h = harness(
            settings,
            all_sensor_rows(),
            FakePredictor::answering(&[(DeviceKind::Fan, "BẬT")]),
            FakeTransport::default(),
            None,
        );
        let mut events = h.engine.subscribe();

        h.engine.tick().await;

        // The command went out but nothing was recorded.
        assert_eq!(h.transport.published.lock().unwrap().len(), 1);
        assert!(h.settings.updates.lock().unwrap().is_empty());
        assert!(matches!(
            events.try_recv(),
            Ok(ControlEvent::DeviceFailed {
                device: DeviceKind::Fan,
                ..
            })
        ));
    }
}
