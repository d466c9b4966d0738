//! JSON-file persistence
//!
//! Append-only per-sensor sample files and a settings file, written
//! atomically (temp file then rename). Duplicate sample delivery from
//! the synchronizer lands as duplicate rows; the aggregator and
//! latest-reading paths are insensitive to that.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenhouse_core::{
    CanonicalSensor, DeviceKind, DeviceSetting, Mode, Notifier, NotifyError, SensorSample,
    SensorStore, SettingsStore, StoreError,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Load a JSON file, treating a missing file as empty
async fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Save a JSON file atomically: write to temp file, then rename
async fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// File-backed implementation of the persistence collaborators
pub struct JsonStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles on the JSON files
    write_lock: Mutex<()>,
}

impl JsonStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn sensor_path(&self, sensor: &str) -> PathBuf {
        self.data_dir.join("sensors").join(format!("{sensor}.json"))
    }

    fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Seed default settings if none are persisted yet. Every device
    /// starts manual and off; switching to automatic is a user action.
    pub async fn ensure_settings(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.settings_path();
        let existing: Vec<DeviceSetting> = load_or_default(&path).await?;
        if !existing.is_empty() {
            return Ok(());
        }
        let defaults: Vec<DeviceSetting> = DeviceKind::ALL
            .iter()
            .map(|kind| DeviceSetting {
                name: kind.name().to_string(),
                mode: Mode::Manual,
                status: false,
            })
            .collect();
        save_atomic(&path, &defaults).await?;
        tracing::info!("Seeded default settings at {:?}", path);
        Ok(())
    }
}

#[async_trait]
impl SensorStore for JsonStore {
    async fn append(&self, sample: &SensorSample) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.sensor_path(&sample.sensor);
        let mut rows: Vec<SensorSample> = load_or_default(&path).await?;
        rows.push(sample.clone());
        save_atomic(&path, &rows).await
    }

    async fn latest_per_sensor(&self) -> Result<Vec<SensorSample>, StoreError> {
        let mut latest = Vec::new();
        for sensor in CanonicalSensor::ALL {
            let rows: Vec<SensorSample> =
                load_or_default(&self.sensor_path(sensor.feed_key())).await?;
            if let Some(last) = rows.into_iter().max_by_key(|s| s.timestamp) {
                latest.push(last);
            }
        }
        Ok(latest)
    }

    async fn daily(
        &self,
        sensor: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorSample>, StoreError> {
        let rows: Vec<SensorSample> = load_or_default(&self.sensor_path(sensor)).await?;
        Ok(rows
            .into_iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .collect())
    }
}

#[async_trait]
impl SettingsStore for JsonStore {
    async fn all_settings(&self) -> Result<Vec<DeviceSetting>, StoreError> {
        load_or_default(&self.settings_path()).await
    }

    async fn update_status(&self, name: &str, status: bool) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.settings_path();
        let mut settings: Vec<DeviceSetting> = load_or_default(&path).await?;
        let Some(setting) = settings.iter_mut().find(|s| s.name == name) else {
            return Err(StoreError::Write(format!("unknown device '{name}'")));
        };
        setting.status = status;
        save_atomic(&path, &settings).await
    }
}

/// Appends notification records as JSON lines
pub struct FileNotifier {
    path: PathBuf,
}

impl FileNotifier {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("notifications.jsonl"),
        }
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    async fn notify(
        &self,
        message: &str,
        category: &str,
        device: &str,
    ) -> Result<(), NotifyError> {
        let record = serde_json::json!({
            "at": Utc::now(),
            "message": message,
            "category": category,
            "device": device,
        });
        let mut line = record.to_string();
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        }
        use tokio::io::AsyncWriteExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}
