//! Send-side mutation translator (spec §4.3, §4.4).
//!
//! Hooks invoked by the local store's listener callbacks when its caches
//! change. Each hook decides whether the mutation is distributable, builds
//! the matching wire event, and hands it to the publisher.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::BusConfig;
use crate::message::{BusEvent, EntityCacheEvent, RelationCacheEvent, RelationSet};
use crate::publisher::Publisher;
use crate::store::EntityGroup;

pub struct Translator {
    publisher: Arc<Publisher>,
    config: Arc<ArcSwap<BusConfig>>,
}

impl Translator {
    pub fn new(publisher: Arc<Publisher>, config: Arc<ArcSwap<BusConfig>>) -> Self {
        Self { publisher, config }
    }

    /// Local full-cache-reset notification (spec §4.3: "deliberately a
    /// no-op for distribution"). A fleet-wide reset would stampede the
    /// authoritative store; operators use out-of-band tooling instead.
    pub async fn on_full_reset(&self) {
        tracing::debug!("local full reset is not distributed");
    }

    /// Local per-type reset notification.
    pub async fn on_group_reset(&self, group: &dyn EntityGroup) {
        if !group.distribute() {
            return;
        }
        self.publisher
            .send(BusEvent::Entity(EntityCacheEvent::GroupReset {
                group_id: group.group_number(),
            }))
            .await;
    }

    /// Local "object expired" notification: an entity was updated. Looks
    /// the entity up by id; if it has already been removed locally by the
    /// time this hook fires, the expiration is suppressed — a separate
    /// removal event follows instead (spec §4.3, spec §8 scenario 2).
    pub async fn on_object_expired(&self, group: &dyn EntityGroup, object_id: i64) {
        if !group.distribute() {
            return;
        }
        let Some(object_properties) = group.write_map(object_id) else {
            tracing::debug!(object_id, "entity removed before expiration fired, suppressing");
            return;
        };
        self.publisher
            .send(BusEvent::Entity(EntityCacheEvent::ObjectReset {
                group_id: group.group_number(),
                object_id,
                object_properties,
            }))
            .await;
    }

    /// Local object-removed notification.
    pub async fn on_object_removed(&self, group: &dyn EntityGroup, object_id: i64) {
        if !group.distribute() {
            return;
        }
        self.publisher
            .send(BusEvent::Entity(EntityCacheEvent::ObjectRemove {
                group_id: group.group_number(),
                object_id,
            }))
            .await;
    }

    pub async fn on_relation_add(&self, relation_id: i64, left_id: i64, right_id: i64) {
        self.publisher
            .send(BusEvent::Relation(RelationCacheEvent::Add {
                relation_id,
                left_id,
                right_id,
            }))
            .await;
    }

    pub async fn on_relation_add_all(&self, relation_id: i64, relation: RelationSet) {
        self.send_bulk(relation_id, relation, |relation_id, relation| {
            RelationCacheEvent::AddAll {
                relation_id,
                relation,
            }
        })
        .await;
    }

    pub async fn on_relation_clear(&self, relation_id: i64) {
        self.publisher
            .send(BusEvent::Relation(RelationCacheEvent::Clear { relation_id }))
            .await;
    }

    pub async fn on_relation_remove(&self, relation_id: i64, left_id: i64, right_id: i64) {
        self.publisher
            .send(BusEvent::Relation(RelationCacheEvent::Remove {
                relation_id,
                left_id,
                right_id,
            }))
            .await;
    }

    pub async fn on_relation_remove_all(&self, relation_id: i64, relation: RelationSet) {
        self.send_bulk(relation_id, relation, |relation_id, relation| {
            RelationCacheEvent::RemoveAll {
                relation_id,
                relation,
            }
        })
        .await;
    }

    pub async fn on_relation_remove_left_value(&self, relation_id: i64, left_id: i64) {
        self.publisher
            .send(BusEvent::Relation(RelationCacheEvent::RemoveLeftValue {
                relation_id,
                left_id,
            }))
            .await;
    }

    pub async fn on_relation_remove_right_value(&self, relation_id: i64, right_id: i64) {
        self.publisher
            .send(BusEvent::Relation(RelationCacheEvent::RemoveRightValue {
                relation_id,
                right_id,
            }))
            .await;
    }

    pub async fn on_relation_replace_all(&self, relation_id: i64, relation: RelationSet) {
        self.send_bulk(relation_id, relation, |relation_id, relation| {
            RelationCacheEvent::ReplaceAll {
                relation_id,
                relation,
            }
        })
        .await;
    }

    pub async fn on_relation_reset(&self, relation_id: i64) {
        self.publisher
            .send(BusEvent::Relation(RelationCacheEvent::Reset { relation_id }))
            .await;
    }

    /// Size-threshold degradation rule (spec §4.4): a bulk payload whose
    /// cardinality exceeds `maximum_relation_size` is replaced with a
    /// single RESET for that relation rather than sent verbatim.
    async fn send_bulk(
        &self,
        relation_id: i64,
        relation: RelationSet,
        build: impl FnOnce(i64, RelationSet) -> RelationCacheEvent,
    ) {
        let maximum = self.config.load().maximum_relation_size;
        let event = if relation.len() > maximum {
            tracing::debug!(
                relation_id,
                cardinality = relation.len(),
                maximum,
                "bulk relation payload exceeds maximum size, degrading to RESET"
            );
            RelationCacheEvent::Reset { relation_id }
        } else {
            build(relation_id, relation)
        };
        self.publisher.send(BusEvent::Relation(event)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryMode;
    use crate::store::MemoryEntityGroup;
    use crate::transport::MemoryTransportHub;
    use serde_json::json;

    async fn translator_with_publisher() -> (Translator, MemoryTransportHub) {
        let hub = MemoryTransportHub::new();
        let mut connection = hub.publish_factory().connect().await.unwrap();
        connection.start().await.unwrap();
        let config = Arc::new(ArcSwap::from_pointee(BusConfig {
            maximum_relation_size: 3,
            delivery_mode: DeliveryMode::Persistent,
        }));
        let publisher = Arc::new(Publisher::new(connection, "CACHE.TOPIC", config.clone()));
        (Translator::new(publisher, config), hub)
    }

    #[tokio::test]
    async fn non_distributing_group_emits_nothing() {
        let (translator, hub) = translator_with_publisher().await;
        let mut sub = hub.subscribe_factory().connect().await.unwrap();
        sub.start().await.unwrap();

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        struct Counter(Arc<std::sync::atomic::AtomicUsize>);
        #[async_trait::async_trait]
        impl crate::transport::MessageListener for Counter {
            async fn on_message(&self, _envelope: crate::transport::Envelope) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
        sub.bind(Arc::new(Counter(counter.clone()))).await.unwrap();

        let group = MemoryEntityGroup::new(1, false, true);
        group.new_object_from_map(1, &{
            let mut p = crate::message::PropertyMap::new();
            p.insert("name".into(), json!("x"));
            p
        });
        translator.on_object_expired(&group, 1).await;

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expiration_after_removal_is_suppressed() {
        let (translator, hub) = translator_with_publisher().await;
        let mut sub = hub.subscribe_factory().connect().await.unwrap();
        sub.start().await.unwrap();
        struct Counter(Arc<std::sync::atomic::AtomicUsize>);
        #[async_trait::async_trait]
        impl crate::transport::MessageListener for Counter {
            async fn on_message(&self, _envelope: crate::transport::Envelope) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        sub.bind(Arc::new(Counter(counter.clone()))).await.unwrap();

        let group = MemoryEntityGroup::new(1, true, true);
        // entity never materialized locally -> write_map returns None
        translator.on_object_expired(&group, 7).await;

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bulk_payload_over_threshold_degrades_to_reset() {
        let (translator, hub) = translator_with_publisher().await;
        let mut sub = hub.subscribe_factory().connect().await.unwrap();
        sub.start().await.unwrap();

        let received: Arc<parking_lot::Mutex<Vec<crate::transport::Envelope>>> =
            Arc::new(parking_lot::Mutex::new(Vec::new()));
        struct Recorder(Arc<parking_lot::Mutex<Vec<crate::transport::Envelope>>>);
        #[async_trait::async_trait]
        impl crate::transport::MessageListener for Recorder {
            async fn on_message(&self, envelope: crate::transport::Envelope) {
                self.0.lock().push(envelope);
            }
        }
        sub.bind(Arc::new(Recorder(received.clone()))).await.unwrap();

        // maximum_relation_size is 3 in translator_with_publisher
        let oversized: RelationSet = (0..10).map(|i| (i, i + 1)).collect();
        translator.on_relation_add_all(5, oversized).await;

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let envelopes = received.lock();
        assert_eq!(envelopes.len(), 1);
        let event: BusEvent = rmp_serde::from_slice(&envelopes[0].payload).unwrap();
        assert_eq!(
            event,
            BusEvent::Relation(RelationCacheEvent::Reset { relation_id: 5 })
        );
    }
}
