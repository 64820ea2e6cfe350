//! In-memory reference store, grounded in the shape of the teacher's
//! `InMemoryCache` (`data/cache/memory.rs`) — a `moka` cache with
//! TinyLFU recency tracking for the entity projection store (the
//! teacher's real analog for "a cache with an ordering structure"; its
//! own `DashMap` usage is for unrelated rate-limit counters), synchronous
//! interior mutability via `parking_lot` for relation pair sets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use moka::sync::Cache;
use parking_lot::RwLock;

use super::error::StoreError;
use super::traits::{CachedRelation, EntityGroup, EntityStore};
use crate::message::{PropertyMap, RelationSet};

/// Generous enough that no test or realistic single-group workload ever
/// evicts an entry the applier still expects to find; eviction here is a
/// safety valve, not a caching strategy this crate relies on.
const MAX_CACHED_OBJECTS: u64 = 1_000_000;

/// One entity type's local cache. `cached = false` models a plain group
/// that participates in distribution but keeps no local materialization.
pub struct MemoryEntityGroup {
    group_number: i64,
    distribute: bool,
    cached: bool,
    objects: Cache<i64, PropertyMap>,
}

impl MemoryEntityGroup {
    pub fn new(group_number: i64, distribute: bool, cached: bool) -> Self {
        Self {
            group_number,
            distribute,
            cached,
            objects: Cache::builder().max_capacity(MAX_CACHED_OBJECTS).build(),
        }
    }
}

impl EntityGroup for MemoryEntityGroup {
    fn group_number(&self) -> i64 {
        self.group_number
    }

    fn distribute(&self) -> bool {
        self.distribute
    }

    fn is_cached(&self) -> bool {
        self.cached
    }

    fn write_map(&self, object_id: i64) -> Option<PropertyMap> {
        self.objects.get(&object_id)
    }

    fn new_object_from_map(&self, object_id: i64, properties: &PropertyMap) {
        self.objects.insert(object_id, properties.clone());
    }

    fn update_object_from_map(&self, object_id: i64, properties: &PropertyMap) {
        self.objects.insert(object_id, properties.clone());
    }

    fn reorder(&self, object_id: i64) {
        // `get` on a moka cache records the access for its TinyLFU
        // recency tracking, which is the re-ordering this entry needs.
        self.objects.get(&object_id);
    }

    fn notify_object_expired(&self, object_id: i64) {
        tracing::trace!(group_number = self.group_number, object_id, "object expired");
    }

    fn remove_from_cache(&self, object_id: i64) {
        self.objects.invalidate(&object_id);
    }

    fn contains(&self, object_id: i64) -> bool {
        self.objects.contains_key(&object_id)
    }

    fn reset(&self, _load_everything: bool, _distribute: bool) {
        self.objects.invalidate_all();
    }
}

/// A fleet-wide many-to-many relation, kept as an ordered pair set.
pub struct MemoryCachedRelation {
    relation_id: i64,
    pairs: RwLock<RelationSet>,
}

impl MemoryCachedRelation {
    pub fn new(relation_id: i64) -> Self {
        Self {
            relation_id,
            pairs: RwLock::new(RelationSet::new()),
        }
    }
}

impl CachedRelation for MemoryCachedRelation {
    fn relation_id(&self) -> i64 {
        self.relation_id
    }

    fn add(&self, left_id: i64, right_id: i64, _distribute: bool, _notify: bool, _persist: bool) {
        self.pairs.write().insert((left_id, right_id));
    }

    fn add_all(&self, pairs: &RelationSet, _distribute: bool, _notify: bool, _persist: bool) {
        self.pairs.write().extend(pairs.iter().copied());
    }

    fn clear(&self, _distribute: bool, _notify: bool, _persist: bool) {
        self.pairs.write().clear();
    }

    fn remove(
        &self,
        left_id: i64,
        right_id: i64,
        _distribute: bool,
        _notify: bool,
        _persist: bool,
    ) {
        self.pairs.write().remove(&(left_id, right_id));
    }

    fn remove_all(&self, pairs: &RelationSet, _distribute: bool, _notify: bool, _persist: bool) {
        let mut guard = self.pairs.write();
        for pair in pairs {
            guard.remove(pair);
        }
    }

    fn remove_left_value(&self, left_id: i64, _distribute: bool, _notify: bool, _persist: bool) {
        self.pairs.write().retain(|(left, _)| *left != left_id);
    }

    fn remove_right_value(&self, right_id: i64, _distribute: bool, _notify: bool, _persist: bool) {
        self.pairs.write().retain(|(_, right)| *right != right_id);
    }

    fn replace_all(&self, pairs: &RelationSet, _distribute: bool, _notify: bool, _persist: bool) {
        *self.pairs.write() = pairs.clone();
    }

    fn reset(&self, _distribute: bool, _notify: bool, _persist: bool) {
        self.pairs.write().clear();
    }

    fn pairs(&self) -> RelationSet {
        self.pairs.read().clone()
    }
}

/// In-memory reference store. Groups and relations are registered up
/// front (a real store discovers them from its type registry); tests
/// build one with [`MemoryStore::new`] then [`MemoryStore::register_group`]
/// / [`MemoryStore::register_relation`].
#[derive(Default)]
pub struct MemoryStore {
    initialized: AtomicBool,
    groups: DashMap<i64, Arc<MemoryEntityGroup>>,
    relations: DashMap<i64, Arc<MemoryCachedRelation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(true),
            groups: DashMap::new(),
            relations: DashMap::new(),
        }
    }

    /// Build an uninitialized store, for exercising the store-readiness
    /// gate (spec §4.5 step 1).
    pub fn uninitialized() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            groups: DashMap::new(),
            relations: DashMap::new(),
        }
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn register_group(
        &self,
        group: Arc<MemoryEntityGroup>,
    ) -> Result<(), StoreError> {
        let number = group.group_number();
        if self.groups.contains_key(&number) {
            return Err(StoreError::GroupAlreadyRegistered(number));
        }
        self.groups.insert(number, group);
        Ok(())
    }

    pub fn register_relation(
        &self,
        relation: Arc<MemoryCachedRelation>,
    ) -> Result<(), StoreError> {
        let id = relation.relation_id();
        if self.relations.contains_key(&id) {
            return Err(StoreError::RelationAlreadyRegistered(id));
        }
        self.relations.insert(id, relation);
        Ok(())
    }
}

impl EntityStore for MemoryStore {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn group_by_number(&self, group_number: i64) -> Option<Arc<dyn EntityGroup>> {
        self.groups
            .get(&group_number)
            .map(|entry| entry.clone() as Arc<dyn EntityGroup>)
    }

    fn cached_relation(&self, relation_id: i64) -> Option<Arc<dyn CachedRelation>> {
        self.relations
            .get(&relation_id)
            .map(|entry| entry.clone() as Arc<dyn CachedRelation>)
    }

    fn reset_all(&self, load_everything: bool, distribute: bool) {
        for group in self.groups.iter() {
            group.reset(load_everything, distribute);
        }
    }
}
