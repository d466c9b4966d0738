//! Actuation publisher

use greenhouse_core::{feeds, DeviceKind, PubSubTransport, TransportError};
use std::sync::Arc;

/// Emits actuation commands on a device's control channel.
///
/// No buffering or retry: a disconnected transport fails the publish
/// loudly and the caller must treat the actuation as not having
/// happened.
pub struct ActuationPublisher {
    transport: Arc<dyn PubSubTransport>,
    /// Account-scoped channel prefix
    feed_prefix: String,
}

impl ActuationPublisher {
    #[must_use]
    pub fn new(transport: Arc<dyn PubSubTransport>, feed_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            feed_prefix: feed_prefix.into(),
        }
    }

    /// Publish an on/off command for a device. Payload is "1" or "0".
    pub async fn publish_status(
        &self,
        kind: DeviceKind,
        status: bool,
    ) -> Result<(), TransportError> {
        if !self.transport.connected() {
            tracing::error!("Transport not connected, dropping {} actuation", kind);
            return Err(TransportError::NotConnected);
        }

        let topic = feeds::feed_topic(&self.feed_prefix, kind.control_feed());
        let payload = if status { "1" } else { "0" };
        self.transport.publish(&topic, payload).await?;
        tracing::info!("Sent to {}: {}", topic, payload);
        Ok(())
    }
}
