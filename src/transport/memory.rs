//! In-memory reference transport backend.
//!
//! Local-only, single-process: suitable for tests and for embedding this
//! crate before a real transport is wired in. Grounded in the teacher's
//! `MemoryTopicBackend` (`data/topics/memory.rs`) — one `broadcast`
//! channel per destination, fire-and-forget, lost if no subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::backend::{
    Envelope, MessageListener, PublishConnection, PublishConnectionFactory, SubscribeConnection,
    SubscribeConnectionFactory,
};
use super::error::TransportError;
use crate::config::DeliveryMode;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Shared in-process hub. Clone and hand out publish/subscribe factories
/// bound to it to simulate multiple fleet instances talking over the same
/// topic within one process (exactly what the end-to-end tests need).
#[derive(Clone)]
pub struct MemoryTransportHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Envelope>>>>,
    capacity: usize,
}

impl Default for MemoryTransportHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransportHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    fn channel(&self, destination: &str) -> broadcast::Sender<Envelope> {
        if let Some(sender) = self.channels.read().get(destination) {
            return sender.clone();
        }
        let mut channels = self.channels.write();
        if let Some(sender) = channels.get(destination) {
            return sender.clone();
        }
        let (sender, _) = broadcast::channel(self.capacity);
        channels.insert(destination.to_string(), sender.clone());
        sender
    }

    pub fn publish_factory(&self) -> MemoryPublishConnectionFactory {
        MemoryPublishConnectionFactory { hub: self.clone() }
    }

    pub fn subscribe_factory(&self) -> MemorySubscribeConnectionFactory {
        MemorySubscribeConnectionFactory { hub: self.clone() }
    }
}

pub struct MemoryPublishConnectionFactory {
    hub: MemoryTransportHub,
}

#[async_trait]
impl PublishConnectionFactory for MemoryPublishConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn PublishConnection>, TransportError> {
        Ok(Box::new(MemoryPublishConnection {
            hub: self.hub.clone(),
            client_id: Uuid::new_v4().to_string(),
        }))
    }
}

pub struct MemoryPublishConnection {
    hub: MemoryTransportHub,
    client_id: String,
}

#[async_trait]
impl PublishConnection for MemoryPublishConnection {
    async fn start(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn send(
        &self,
        destination: &str,
        envelope: Envelope,
        _delivery_mode: DeliveryMode,
    ) -> Result<(), TransportError> {
        let sender = self.hub.channel(destination);
        // Ignore send errors: no active subscribers means the message is
        // dropped, which is within spec for this fire-and-forget reference
        // backend (a durable transport would persist it instead).
        let _ = sender.send(envelope);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct MemorySubscribeConnectionFactory {
    hub: MemoryTransportHub,
}

#[async_trait]
impl SubscribeConnectionFactory for MemorySubscribeConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn SubscribeConnection>, TransportError> {
        Ok(Box::new(MemorySubscribeConnection {
            hub: self.hub.clone(),
            dispatcher: None,
        }))
    }
}

pub struct MemorySubscribeConnection {
    hub: MemoryTransportHub,
    dispatcher: Option<JoinHandle<()>>,
}

#[async_trait]
impl SubscribeConnection for MemorySubscribeConnection {
    async fn start(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(
        &mut self,
        destination: &str,
        handler: Arc<dyn MessageListener>,
    ) -> Result<(), TransportError> {
        if self.dispatcher.is_some() {
            return Err(TransportError::AlreadySubscribed);
        }
        let mut receiver = self.hub.channel(destination).subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => handler.on_message(envelope).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.dispatcher = Some(handle);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(handle) = self.dispatcher.take() {
            handle.abort();
        }
        Ok(())
    }
}
