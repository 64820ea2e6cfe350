//! Transport trait boundary (spec §6).
//!
//! The real pub/sub transport — a durable topic messaging system with
//! message properties and typed payloads — is named but not specified by
//! the source spec. This module is the seam: a production embedder
//! implements these traits against Kafka, NATS, a JMS bridge, or (as the
//! teacher's `RedisTopicBackend` demonstrates for its own cache/topic
//! layer) Redis Streams/Pub-Sub. [`crate::transport::memory`] ships one
//! reference implementation so the crate is runnable standalone.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::TransportError;
use crate::config::DeliveryMode;

/// An envelope in flight: an opaque serialized payload plus string
/// properties (spec §3, §6). The bus never inspects `payload` bytes
/// itself at this layer — decoding into a [`crate::message::BusEvent`]
/// happens in the applier.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
}

impl Envelope {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Handler invoked on the transport's delivery thread for each inbound
/// envelope (spec §2: "dispatching each incoming envelope to a handler on
/// a transport-owned delivery thread").
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_message(&self, envelope: Envelope);
}

/// A live connection on the publish side.
#[async_trait]
pub trait PublishConnection: Send + Sync {
    /// Start the connection. The client identifier becomes available only
    /// after this returns (spec §4.1).
    async fn start(&mut self) -> Result<(), TransportError>;

    /// This connection's transport-assigned unique client identifier.
    fn client_id(&self) -> &str;

    async fn send(
        &self,
        destination: &str,
        envelope: Envelope,
        delivery_mode: DeliveryMode,
    ) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A live connection on the subscribe side.
#[async_trait]
pub trait SubscribeConnection: Send + Sync {
    async fn start(&mut self) -> Result<(), TransportError>;

    /// Bind `handler` to `destination` on this connection's delivery
    /// thread. Returns once the subscription is active, not once it's
    /// drained — delivery is asynchronous from here on.
    async fn subscribe(
        &mut self,
        destination: &str,
        handler: Arc<dyn MessageListener>,
    ) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens publish connections. Supplied by the embedding application
/// (spec §4.1: `construct(app, publishFactory, subscribeFactory)`).
#[async_trait]
pub trait PublishConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PublishConnection>, TransportError>;
}

/// Opens subscribe connections.
#[async_trait]
pub trait SubscribeConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SubscribeConnection>, TransportError>;
}
