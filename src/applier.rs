//! Receive-side event applier (spec §4.5): the subscriber's message
//! handler. Runs entirely on the transport's delivery thread — one
//! envelope at a time, no queueing or reordering (spec §4.6).

use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::SENDER_ID_PROPERTY;
use crate::message::{BusEvent, EntityCacheEvent, RelationCacheEvent};
use crate::store::EntityStore;
use crate::transport::{Envelope, MessageListener};

/// The suppression flags every applied mutation carries: re-broadcast
/// suppressed, local listeners still notified, no persistence write-back
/// (spec §4.5 step 5).
const DISTRIBUTE: bool = false;
const NOTIFY: bool = true;
const PERSIST: bool = false;

pub struct Applier {
    instance_id: String,
    store: Arc<dyn EntityStore>,
}

impl Applier {
    pub fn new(instance_id: impl Into<String>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            instance_id: instance_id.into(),
            store,
        }
    }

    fn apply_entity(&self, event: EntityCacheEvent) {
        match event {
            EntityCacheEvent::FullReset => {
                self.store.reset_all(true, DISTRIBUTE);
            }
            EntityCacheEvent::GroupReset { group_id } => match self.store.group_by_number(group_id) {
                Some(group) => group.reset(true, DISTRIBUTE),
                None => tracing::warn!(group_id, "unknown group for GROUP_RESET, dropping"),
            },
            EntityCacheEvent::ObjectReset {
                group_id,
                object_id,
                object_properties,
            } => match self.store.group_by_number(group_id) {
                None => {
                    tracing::warn!(group_id, "unknown group for OBJECT_RESET, dropping")
                }
                Some(group) if !group.is_cached() => {
                    tracing::debug!(group_id, "group not locally cached, dropping OBJECT_RESET")
                }
                Some(group) => {
                    if group.contains(object_id) {
                        group.update_object_from_map(object_id, &object_properties);
                        group.reorder(object_id);
                    } else {
                        group.new_object_from_map(object_id, &object_properties);
                    }
                    group.notify_object_expired(object_id);
                }
            },
            EntityCacheEvent::ObjectRemove { group_id, object_id } => {
                match self.store.group_by_number(group_id) {
                    None => {
                        tracing::warn!(group_id, "unknown group for OBJECT_REMOVE, dropping")
                    }
                    Some(group) if !group.is_cached() => tracing::debug!(
                        group_id,
                        "group not locally cached, dropping OBJECT_REMOVE"
                    ),
                    Some(group) => group.remove_from_cache(object_id),
                }
            }
        }
    }

    fn apply_relation(&self, event: RelationCacheEvent) {
        let relation_id = event.relation_id();
        let Some(relation) = self.store.cached_relation(relation_id) else {
            tracing::warn!(relation_id, "unknown relation, dropping");
            return;
        };

        match event {
            RelationCacheEvent::Add {
                left_id, right_id, ..
            } => relation.add(left_id, right_id, DISTRIBUTE, NOTIFY, PERSIST),
            RelationCacheEvent::AddAll { relation: pairs, .. } => {
                relation.add_all(&pairs, DISTRIBUTE, NOTIFY, PERSIST)
            }
            RelationCacheEvent::Clear { .. } => relation.clear(DISTRIBUTE, NOTIFY, PERSIST),
            RelationCacheEvent::Remove {
                left_id, right_id, ..
            } => relation.remove(left_id, right_id, DISTRIBUTE, NOTIFY, PERSIST),
            RelationCacheEvent::RemoveAll { relation: pairs, .. } => {
                relation.remove_all(&pairs, DISTRIBUTE, NOTIFY, PERSIST)
            }
            RelationCacheEvent::RemoveLeftValue { left_id, .. } => {
                relation.remove_left_value(left_id, DISTRIBUTE, NOTIFY, PERSIST)
            }
            RelationCacheEvent::RemoveRightValue { right_id, .. } => {
                relation.remove_right_value(right_id, DISTRIBUTE, NOTIFY, PERSIST)
            }
            RelationCacheEvent::ReplaceAll { relation: pairs, .. } => {
                relation.replace_all(&pairs, DISTRIBUTE, NOTIFY, PERSIST)
            }
            RelationCacheEvent::Reset { .. } => relation.reset(DISTRIBUTE, NOTIFY, PERSIST),
        }
    }
}

#[async_trait]
impl MessageListener for Applier {
    async fn on_message(&self, envelope: Envelope) {
        if !self.store.is_initialized() {
            tracing::debug!("store not initialized, dropping cache event");
            return;
        }

        let event: BusEvent = match rmp_serde::from_slice(&envelope.payload) {
            Ok(event) => event,
            Err(error) => {
                tracing::info!(%error, "malformed cache event payload, dropping");
                return;
            }
        };

        let Some(sender_id) = envelope.property(SENDER_ID_PROPERTY) else {
            tracing::info!("envelope missing sender identity property, dropping");
            return;
        };
        if sender_id == self.instance_id {
            return;
        }

        match event {
            BusEvent::Entity(event) => self.apply_entity(event),
            BusEvent::Relation(event) => self.apply_relation(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{PropertyMap, RelationSet};
    use crate::store::{MemoryCachedRelation, MemoryEntityGroup, MemoryStore};
    use serde_json::json;

    fn envelope_for(event: BusEvent, sender: &str) -> Envelope {
        let payload = rmp_serde::to_vec(&event).unwrap();
        Envelope::new(payload).with_property(SENDER_ID_PROPERTY, sender)
    }

    #[tokio::test]
    async fn self_originated_envelope_is_dropped_silently() {
        let store = Arc::new(MemoryStore::new());
        let group = Arc::new(MemoryEntityGroup::new(1, true, true));
        group.new_object_from_map(5, &PropertyMap::new());
        store.register_group(group).unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let event = BusEvent::Entity(EntityCacheEvent::ObjectRemove {
            group_id: 1,
            object_id: 5,
        });
        applier
            .on_message(envelope_for(event, "instance-a"))
            .await;

        // self-loop suppression means the remove never applied
        assert!(store.group_by_number(1).unwrap().contains(5));
    }

    #[tokio::test]
    async fn missing_sender_property_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let applier = Applier::new("instance-a", store.clone());

        let event = BusEvent::Entity(EntityCacheEvent::GroupReset { group_id: 1 });
        let payload = rmp_serde::to_vec(&event).unwrap();
        applier.on_message(Envelope::new(payload)).await;
        // nothing to assert on directly beyond "did not panic"; covered by
        // the absence of any group mutation since no group is registered.
    }

    #[tokio::test]
    async fn uninitialized_store_drops_everything() {
        let store = Arc::new(MemoryStore::uninitialized());
        store
            .register_group(Arc::new(MemoryEntityGroup::new(1, true, true)))
            .unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let mut props = PropertyMap::new();
        props.insert("name".into(), json!("x"));
        let event = BusEvent::Entity(EntityCacheEvent::ObjectReset {
            group_id: 1,
            object_id: 1,
            object_properties: props,
        });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;

        assert!(!store.group_by_number(1).unwrap().contains(1));
    }

    #[tokio::test]
    async fn object_reset_materializes_new_entity() {
        let store = Arc::new(MemoryStore::new());
        store
            .register_group(Arc::new(MemoryEntityGroup::new(1, true, true)))
            .unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let mut props = PropertyMap::new();
        props.insert("name".into(), json!("x"));
        let event = BusEvent::Entity(EntityCacheEvent::ObjectReset {
            group_id: 1,
            object_id: 42,
            object_properties: props.clone(),
        });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;

        let group = store.group_by_number(1).unwrap();
        assert_eq!(group.write_map(42), Some(props));
    }

    #[tokio::test]
    async fn object_reset_updates_existing_entity_and_reorders() {
        let store = Arc::new(MemoryStore::new());
        let group = Arc::new(MemoryEntityGroup::new(1, true, true));
        let mut old_props = PropertyMap::new();
        old_props.insert("name".into(), json!("old"));
        group.new_object_from_map(42, &old_props);
        store.register_group(group).unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let mut new_props = PropertyMap::new();
        new_props.insert("name".into(), json!("new"));
        let event = BusEvent::Entity(EntityCacheEvent::ObjectReset {
            group_id: 1,
            object_id: 42,
            object_properties: new_props.clone(),
        });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;

        let group = store.group_by_number(1).unwrap();
        assert_eq!(group.write_map(42), Some(new_props));
    }

    #[tokio::test]
    async fn object_reset_on_uncached_group_is_silent_no_op() {
        let store = Arc::new(MemoryStore::new());
        store
            .register_group(Arc::new(MemoryEntityGroup::new(2, true, false)))
            .unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let mut props = PropertyMap::new();
        props.insert("name".into(), json!("x"));
        let event = BusEvent::Entity(EntityCacheEvent::ObjectReset {
            group_id: 2,
            object_id: 1,
            object_properties: props,
        });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;
        // uncached group has nothing to assert against directly; the
        // point is this does not panic or attempt to materialize.
    }

    #[tokio::test]
    async fn object_remove_on_absent_id_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store
            .register_group(Arc::new(MemoryEntityGroup::new(1, true, true)))
            .unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let event = BusEvent::Entity(EntityCacheEvent::ObjectRemove {
            group_id: 1,
            object_id: 999,
        });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;

        assert!(!store.group_by_number(1).unwrap().contains(999));
    }

    #[tokio::test]
    async fn relation_reset_clears_pairs() {
        let store = Arc::new(MemoryStore::new());
        let relation = Arc::new(MemoryCachedRelation::new(5));
        relation.add(1, 2, false, true, false);
        store.register_relation(relation).unwrap();
        let applier = Applier::new("instance-a", store.clone());

        let event = BusEvent::Relation(RelationCacheEvent::Reset { relation_id: 5 });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;

        assert!(store.cached_relation(5).unwrap().pairs().is_empty());
    }

    #[tokio::test]
    async fn unknown_relation_id_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let applier = Applier::new("instance-a", store.clone());

        let event = BusEvent::Relation(RelationCacheEvent::AddAll {
            relation_id: 404,
            relation: RelationSet::from([(1, 2)]),
        });
        applier
            .on_message(envelope_for(event, "instance-b"))
            .await;
        // no relation registered -> nothing to mutate; absence of a panic
        // and the warn log are the only observable effects.
    }
}
