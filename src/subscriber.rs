//! Async subscriber wrapper (spec §2): the inbound side of the topic.

use std::sync::Arc;

use crate::transport::{MessageListener, SubscribeConnection, TransportError};

/// Wraps an inbound connection and binds a handler to a destination. All
/// dispatch happens on the transport's own delivery thread; this wrapper
/// does no buffering of its own.
pub struct AsyncSubscriber {
    connection: Box<dyn SubscribeConnection>,
    destination: String,
}

impl AsyncSubscriber {
    pub fn new(connection: Box<dyn SubscribeConnection>, destination: impl Into<String>) -> Self {
        Self {
            connection,
            destination: destination.into(),
        }
    }

    pub async fn start(&mut self) -> Result<(), TransportError> {
        self.connection.start().await
    }

    /// Bind `handler` as this subscriber's envelope handler. Returns once
    /// the subscription is active; delivery is asynchronous from here on.
    pub async fn bind(&mut self, handler: Arc<dyn MessageListener>) -> Result<(), TransportError> {
        self.connection.subscribe(&self.destination, handler).await
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.connection.close().await
    }
}
