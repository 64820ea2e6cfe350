//! Local entity store trait boundary (spec §6).
//!
//! Named but not specified by the source spec: the authoritative store,
//! its per-type groups, and its cached relations are owned by the
//! embedding application. These traits are the seam the translator and
//! applier program against, grounded in the shape of the teacher's
//! `CacheBackend` trait (`data/cache/backend.rs`) — a small, `Send + Sync`
//! surface with one reference (in-memory) implementation.

use std::sync::Arc;

use crate::message::{PropertyMap, RelationSet};

/// An entity type's local representation.
///
/// A *plain* group (no local cache) still participates in distribution —
/// `distribute()` gates whether this process broadcasts mutations to it —
/// but has nothing for the applier to materialize into, so object-level
/// receive-side events are silently dropped for it (spec §4.5).
pub trait EntityGroup: Send + Sync {
    /// Fleet-wide numeric identifier for this entity type.
    fn group_number(&self) -> i64;

    /// Whether local mutations to this group are broadcast.
    fn distribute(&self) -> bool;

    /// Whether this group keeps a local in-memory cache. Object-level
    /// receive-side events are dropped silently when false (spec §4.5).
    fn is_cached(&self) -> bool;

    /// Full property projection for an entity still present in the local
    /// cache, or `None` if absent (used by the send-side translator's
    /// "object expired" hook, and by the round-trip test in spec §8).
    fn write_map(&self, object_id: i64) -> Option<PropertyMap>;

    /// Materialize a new entity from a projection and insert it into the
    /// local cache.
    fn new_object_from_map(&self, object_id: i64, properties: &PropertyMap);

    /// Update an already-cached entity in place from a projection.
    fn update_object_from_map(&self, object_id: i64, properties: &PropertyMap);

    /// Re-order `object_id` within the cache's ordering/recency structure
    /// without changing its stored value (spec §6: "reorder by id"; spec
    /// §4.5 OBJECT_RESET: updating an already-present entity also
    /// re-orders it).
    fn reorder(&self, object_id: i64);

    /// Notify this group's local listeners that `object_id` expired,
    /// without re-entering distribution (spec §4.5: applied OBJECT_RESET
    /// events "notify local listeners of an expiration event without
    /// distribution").
    fn notify_object_expired(&self, object_id: i64);

    /// Remove an entity from the local cache. A no-op if absent (spec §8
    /// "Idempotence of OBJECT_REMOVE").
    fn remove_from_cache(&self, object_id: i64);

    /// Whether `object_id` is currently present in the local cache.
    fn contains(&self, object_id: i64) -> bool;

    /// Per-type reset: drop (and optionally reload) this group's cache.
    /// `distribute` controls whether this reset itself re-enters the send
    /// side; the applier always calls this with `distribute = false`.
    fn reset(&self, load_everything: bool, distribute: bool);
}

/// A fleet-wide many-to-many relation between entity identifiers.
///
/// Every mutation takes the three suppression flags from spec §4.5: when
/// the applier invokes these, `distribute = false` (do not re-broadcast),
/// `notify = true` (local listeners should still hear about it), and
/// `persist = false` (do not write through to the authoritative store).
pub trait CachedRelation: Send + Sync {
    fn relation_id(&self) -> i64;

    fn add(&self, left_id: i64, right_id: i64, distribute: bool, notify: bool, persist: bool);
    fn add_all(&self, pairs: &RelationSet, distribute: bool, notify: bool, persist: bool);
    fn clear(&self, distribute: bool, notify: bool, persist: bool);
    fn remove(&self, left_id: i64, right_id: i64, distribute: bool, notify: bool, persist: bool);
    fn remove_all(&self, pairs: &RelationSet, distribute: bool, notify: bool, persist: bool);
    fn remove_left_value(&self, left_id: i64, distribute: bool, notify: bool, persist: bool);
    fn remove_right_value(&self, right_id: i64, distribute: bool, notify: bool, persist: bool);
    fn replace_all(&self, pairs: &RelationSet, distribute: bool, notify: bool, persist: bool);
    fn reset(&self, distribute: bool, notify: bool, persist: bool);

    /// Snapshot of current pairs, for tests and for `write_map`-style
    /// round-tripping of relation state.
    fn pairs(&self) -> RelationSet;
}

/// The local entity store itself: group and relation lookup, plus a
/// store-wide readiness gate (spec §4.5 step 1).
pub trait EntityStore: Send + Sync {
    /// Whether the store has completed local bootstrap. Events arriving
    /// before this is true are dropped silently with a debug log.
    fn is_initialized(&self) -> bool;

    /// Look up a group by its fleet-wide numeric id. `None` means the
    /// group id is unknown to this process entirely — an error-level
    /// condition distinct from a known-but-uncached group (spec §4.5).
    fn group_by_number(&self, group_number: i64) -> Option<Arc<dyn EntityGroup>>;

    /// Look up a cached relation by its fleet-wide numeric id.
    fn cached_relation(&self, relation_id: i64) -> Option<Arc<dyn CachedRelation>>;

    /// Store-wide full reset. The send-side translator never calls this
    /// (spec §4.3: full reset is a deliberate no-op for distribution); the
    /// applier's FULL_RESET path does, with `distribute = false`.
    fn reset_all(&self, load_everything: bool, distribute: bool);
}
