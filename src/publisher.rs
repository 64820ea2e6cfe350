//! Publisher wrapper (spec §4.2): the outbound side of the topic.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::config::BusConfig;
use crate::constants::SENDER_ID_PROPERTY;
use crate::message::BusEvent;
use crate::transport::{Envelope, PublishConnection, TransportError};

/// Wraps an outbound connection, stamping every envelope with this
/// instance's client identifier and the currently configured delivery
/// mode before handing it to the transport.
///
/// The connection lives behind a `tokio::sync::Mutex` rather than
/// requiring `&mut self`: the manager shares one `Arc<Publisher>` with
/// the translator, so `start`/`send`/`close` all need to work through a
/// shared reference.
pub struct Publisher {
    connection: Mutex<Box<dyn PublishConnection>>,
    instance_id: String,
    destination: String,
    config: Arc<ArcSwap<BusConfig>>,
}

impl Publisher {
    /// `connection` must already have been started so its client
    /// identifier is available (spec §4.1: "read its client identifier
    /// into `instanceID`" happens before the publisher is constructed).
    pub fn new(
        connection: Box<dyn PublishConnection>,
        destination: impl Into<String>,
        config: Arc<ArcSwap<BusConfig>>,
    ) -> Self {
        let instance_id = connection.client_id().to_string();
        Self {
            connection: Mutex::new(connection),
            instance_id,
            destination: destination.into(),
            config,
        }
    }

    /// This instance's transport-assigned client identifier.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Serialize and send `event`. On transport failure, logs and
    /// swallows the error — loss of a cache-coherence event is tolerable
    /// (spec §4.2).
    pub async fn send(&self, event: BusEvent) {
        let payload = match rmp_serde::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(%error, "failed to serialize outbound cache event");
                return;
            }
        };

        let envelope =
            Envelope::new(payload).with_property(SENDER_ID_PROPERTY, &self.instance_id);
        let delivery_mode = self.config.load().delivery_mode;

        let connection = self.connection.lock().await;
        if let Err(error) = connection
            .send(&self.destination, envelope, delivery_mode)
            .await
        {
            tracing::warn!(%error, destination = %self.destination, "failed to publish cache event");
        }
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.connection.lock().await.close().await
    }
}
