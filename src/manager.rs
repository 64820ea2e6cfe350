//! Lifecycle manager (spec §4.1): constructs the publisher/subscriber pair
//! against supplied transport factories and owns start/connect/close.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::applier::Applier;
use crate::config::{BusConfig, Configurable};
use crate::constants::CACHE_TOPIC;
use crate::error::BusError;
use crate::publisher::Publisher;
use crate::store::EntityStore;
use crate::subscriber::AsyncSubscriber;
use crate::transport::{PublishConnectionFactory, SubscribeConnectionFactory};
use crate::translator::Translator;

struct Runtime {
    publisher: Arc<Publisher>,
    subscriber: AsyncSubscriber,
    translator: Arc<Translator>,
}

/// Owns the bus's live connections and (re)builds them on demand.
/// `connect` is idempotent: an existing publisher/subscriber is closed
/// before a new one is opened (spec §4.1).
pub struct CacheMessageManager {
    publish_factory: Arc<dyn PublishConnectionFactory>,
    subscribe_factory: Arc<dyn SubscribeConnectionFactory>,
    store: Arc<dyn EntityStore>,
    config: Arc<ArcSwap<BusConfig>>,
    runtime: Mutex<Option<Runtime>>,
}

impl CacheMessageManager {
    /// Stores references and returns the manager ready for `start`. The
    /// caller registers it with a `ConfigRegistry` (spec §4.1: "registers
    /// itself as a configurable") — done by the caller, not here, since
    /// registration requires the manager to already be behind an `Arc`.
    pub fn new(
        publish_factory: Arc<dyn PublishConnectionFactory>,
        subscribe_factory: Arc<dyn SubscribeConnectionFactory>,
        store: Arc<dyn EntityStore>,
        config: BusConfig,
    ) -> Self {
        Self {
            publish_factory,
            subscribe_factory,
            store,
            config: Arc::new(ArcSwap::from_pointee(config)),
            runtime: Mutex::new(None),
        }
    }

    /// Current effective configuration. Cheap and lock-free (spec §5:
    /// "stale reads are acceptable").
    pub fn config(&self) -> BusConfig {
        (**self.config.load()).clone()
    }

    /// The send-side translator for the currently connected runtime, if
    /// any. The embedding store calls through this from its own mutation
    /// listeners (spec §4.3/§4.4).
    pub async fn translator(&self) -> Option<Arc<Translator>> {
        self.runtime.lock().await.as_ref().map(|rt| rt.translator.clone())
    }

    /// This instance's transport-assigned client identifier, if connected.
    pub async fn instance_id(&self) -> Option<String> {
        self.runtime
            .lock()
            .await
            .as_ref()
            .map(|rt| rt.publisher.instance_id().to_string())
    }

    pub async fn start(&self) -> Result<(), BusError> {
        self.connect().await
    }

    /// Idempotent (re)connect (spec §4.1). Opens a publish connection,
    /// starts it, reads its client identifier, builds the publisher;
    /// opens a subscribe connection, starts it, binds the applier as its
    /// handler. A failure at any step fails the whole call and closes
    /// whatever was partially constructed.
    pub async fn connect(&self) -> Result<(), BusError> {
        let mut guard = self.runtime.lock().await;
        if let Some(previous) = guard.take() {
            Self::close_runtime(previous).await;
        }

        let mut publish_connection = self.publish_factory.connect().await?;
        publish_connection.start().await?;
        let publisher = Arc::new(Publisher::new(
            publish_connection,
            CACHE_TOPIC,
            self.config.clone(),
        ));

        let subscriber = match self.open_subscriber(publisher.instance_id()).await {
            Ok(subscriber) => subscriber,
            Err(error) => {
                if let Err(close_error) = publisher.close().await {
                    tracing::warn!(%close_error, "error closing publisher after failed connect");
                }
                return Err(error);
            }
        };

        let translator = Arc::new(Translator::new(publisher.clone(), self.config.clone()));
        *guard = Some(Runtime {
            publisher,
            subscriber,
            translator,
        });
        Ok(())
    }

    async fn open_subscriber(&self, instance_id: &str) -> Result<AsyncSubscriber, BusError> {
        let mut subscribe_connection = self.subscribe_factory.connect().await?;
        subscribe_connection.start().await?;
        let mut subscriber = AsyncSubscriber::new(subscribe_connection, CACHE_TOPIC);
        let applier = Arc::new(Applier::new(instance_id, self.store.clone()));
        subscriber.bind(applier).await?;
        Ok(subscriber)
    }

    /// Safe to call even if never started.
    pub async fn close(&self) {
        let mut guard = self.runtime.lock().await;
        if let Some(runtime) = guard.take() {
            Self::close_runtime(runtime).await;
        }
    }

    async fn close_runtime(mut runtime: Runtime) {
        if let Err(error) = runtime.publisher.close().await {
            tracing::warn!(%error, "error closing publisher connection");
        }
        if let Err(error) = runtime.subscriber.close().await {
            tracing::warn!(%error, "error closing subscriber connection");
        }
    }
}

impl Configurable for CacheMessageManager {
    fn configure(&self, config: &BusConfig) {
        self.config.store(Arc::new(config.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryMode;
    use crate::store::MemoryStore;
    use crate::transport::MemoryTransportHub;

    #[tokio::test]
    async fn connect_assigns_an_instance_id() {
        let hub = MemoryTransportHub::new();
        let manager = CacheMessageManager::new(
            Arc::new(hub.publish_factory()),
            Arc::new(hub.subscribe_factory()),
            Arc::new(MemoryStore::new()),
            BusConfig::default(),
        );

        manager.start().await.unwrap();
        assert!(manager.instance_id().await.is_some());
    }

    #[tokio::test]
    async fn reconnect_replaces_instance_id() {
        let hub = MemoryTransportHub::new();
        let manager = CacheMessageManager::new(
            Arc::new(hub.publish_factory()),
            Arc::new(hub.subscribe_factory()),
            Arc::new(MemoryStore::new()),
            BusConfig::default(),
        );

        manager.start().await.unwrap();
        let first = manager.instance_id().await.unwrap();
        manager.connect().await.unwrap();
        let second = manager.instance_id().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn close_before_start_is_safe() {
        let hub = MemoryTransportHub::new();
        let manager = CacheMessageManager::new(
            Arc::new(hub.publish_factory()),
            Arc::new(hub.subscribe_factory()),
            Arc::new(MemoryStore::new()),
            BusConfig::default(),
        );
        manager.close().await;
    }

    #[tokio::test]
    async fn configure_reaches_translator_via_arc_swap() {
        let hub = MemoryTransportHub::new();
        let manager = CacheMessageManager::new(
            Arc::new(hub.publish_factory()),
            Arc::new(hub.subscribe_factory()),
            Arc::new(MemoryStore::new()),
            BusConfig::default(),
        );
        manager.start().await.unwrap();

        manager.configure(&BusConfig {
            maximum_relation_size: 1,
            delivery_mode: DeliveryMode::NonPersistent,
        });

        assert_eq!(manager.config().maximum_relation_size, 1);
        assert_eq!(manager.config().delivery_mode, DeliveryMode::NonPersistent);
    }
}
