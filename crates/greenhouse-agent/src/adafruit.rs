//! Adafruit IO adapters
//!
//! One HTTP client backs both collaborator contracts: the telemetry
//! connector (feed data reads) and the pub/sub transport (actuation
//! publishes). The connected flag is set by a startup probe and cleared
//! whenever a request fails, so the engine refuses to actuate over a
//! link that just broke.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenhouse_core::{ConnectorError, PubSubTransport, RawSample, TelemetryConnector, TransportError};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const AIO_KEY_HEADER: &str = "X-AIO-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A data row as returned by the Adafruit IO data API. Values arrive as
/// strings; either field may be missing.
#[derive(Debug, Deserialize)]
struct DataRow {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct AdafruitClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    key: String,
    up: AtomicBool,
}

impl AdafruitClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, key: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            username: username.into(),
            key: key.into(),
            up: AtomicBool::new(false),
        })
    }

    /// Account-scoped prefix for feed topics
    #[must_use]
    pub fn topic_prefix(&self) -> &str {
        &self.username
    }

    fn feed_data_url(&self, feed: &str) -> String {
        format!(
            "{}/{}/feeds/{}/data",
            self.base_url, self.username, feed
        )
    }

    /// Probe the platform and record reachability
    pub async fn connect(&self) -> bool {
        let url = format!("{}/{}/feeds", self.base_url, self.username);
        let reachable = match self
            .http
            .get(&url)
            .header(AIO_KEY_HEADER, &self.key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Platform probe failed: {}", e);
                false
            }
        };
        self.up.store(reachable, Ordering::SeqCst);
        if reachable {
            tracing::info!("Connected to telemetry platform at {}", self.base_url);
        }
        reachable
    }

    fn mark(&self, ok: bool) {
        self.up.store(ok, Ordering::SeqCst);
    }
}

#[async_trait]
impl TelemetryConnector for AdafruitClient {
    async fn fetch_feed(&self, feed: &str) -> Result<Vec<RawSample>, ConnectorError> {
        let response = self
            .http
            .get(self.feed_data_url(feed))
            .header(AIO_KEY_HEADER, &self.key)
            .send()
            .await
            .map_err(|e| {
                self.mark(false);
                if e.is_timeout() {
                    ConnectorError::Timeout
                } else {
                    ConnectorError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            self.mark(false);
            return Err(ConnectorError::Http(format!(
                "feed '{feed}': status {}",
                response.status()
            )));
        }

        let rows: Vec<DataRow> = response
            .json()
            .await
            .map_err(|e| ConnectorError::Malformed(e.to_string()))?;
        self.mark(true);

        // Unparseable values become partial samples; the synchronizer
        // drops those.
        Ok(rows
            .into_iter()
            .map(|row| RawSample {
                value: row.value.and_then(|v| v.parse().ok()),
                created_at: row.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl PubSubTransport for AdafruitClient {
    fn connected(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        // Topics are "{username}/feeds/{feed}"; the data API is keyed by
        // the feed alone.
        let feed = topic.rsplit('/').next().unwrap_or(topic);

        let response = self
            .http
            .post(self.feed_data_url(feed))
            .header(AIO_KEY_HEADER, &self.key)
            .json(&serde_json::json!({ "value": payload }))
            .send()
            .await
            .map_err(|e| {
                self.mark(false);
                TransportError::Publish(e.to_string())
            })?;

        if !response.status().is_success() {
            self.mark(false);
            return Err(TransportError::Publish(format!(
                "feed '{feed}': status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
