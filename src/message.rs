//! Message vocabulary: the two tagged payload families carried over the bus.
//!
//! `EntityCacheEvent` and `RelationCacheEvent` are the wire vocabulary
//! described in spec §3. Both are sum types (one variant per action) rather
//! than a flat record with an unused-field action code, per the design note
//! on tagged payloads.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered projection of an entity's properties, sufficient to materialize
/// it from scratch. Backed by `serde_json::Map`, which preserves insertion
/// order (the `preserve_order` feature) since some stores' materialization
/// depends on it.
pub type PropertyMap = Map<String, Value>;

/// A single (leftId, rightId) member of a relation.
pub type RelationPair = (i64, i64);

/// A bulk relation payload. `BTreeSet` gives a stable iteration order, which
/// keeps serialized payloads deterministic for the same logical set.
pub type RelationSet = BTreeSet<RelationPair>;

/// Mutation events for entity-level (single-type) local caches.
///
/// Invariants (spec §3): `GroupReset` requires a valid `group_id`;
/// `ObjectReset`/`ObjectRemove` require both `group_id` and `object_id`;
/// `ObjectReset` carries a complete property projection, not just an
/// invalidation signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityCacheEvent {
    /// Unreachable in practice: the send side never emits this (spec §4.3,
    /// §9 open question). Kept so a conformant peer from a mixed fleet can
    /// still be applied harmlessly on receive.
    FullReset,
    GroupReset {
        group_id: i64,
    },
    ObjectReset {
        group_id: i64,
        object_id: i64,
        object_properties: PropertyMap,
    },
    ObjectRemove {
        group_id: i64,
        object_id: i64,
    },
}

/// Mutation events for many-to-many relations between entity identifiers.
///
/// Bulk variants (`AddAll`/`RemoveAll`/`ReplaceAll`) carry a pair set whose
/// cardinality must be `<= maximumRelationSize`; enforcement happens on the
/// send side (translator), not here — see [`crate::translator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationCacheEvent {
    Add {
        relation_id: i64,
        left_id: i64,
        right_id: i64,
    },
    AddAll {
        relation_id: i64,
        relation: RelationSet,
    },
    Clear {
        relation_id: i64,
    },
    Remove {
        relation_id: i64,
        left_id: i64,
        right_id: i64,
    },
    RemoveAll {
        relation_id: i64,
        relation: RelationSet,
    },
    RemoveLeftValue {
        relation_id: i64,
        left_id: i64,
    },
    RemoveRightValue {
        relation_id: i64,
        right_id: i64,
    },
    ReplaceAll {
        relation_id: i64,
        relation: RelationSet,
    },
    Reset {
        relation_id: i64,
    },
}

impl RelationCacheEvent {
    pub fn relation_id(&self) -> i64 {
        match self {
            Self::Add { relation_id, .. }
            | Self::AddAll { relation_id, .. }
            | Self::Clear { relation_id }
            | Self::Remove { relation_id, .. }
            | Self::RemoveAll { relation_id, .. }
            | Self::RemoveLeftValue { relation_id, .. }
            | Self::RemoveRightValue { relation_id, .. }
            | Self::ReplaceAll { relation_id, .. }
            | Self::Reset { relation_id } => *relation_id,
        }
    }
}

/// The envelope payload: one of the two event families.
///
/// This is what gets serialized onto the transport (spec §3: "Serializable;
/// opaque to the transport"). The applier's decode step (spec §4.5 step 3)
/// is exactly "deserialize into `BusEvent`, drop on failure".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BusEvent {
    Entity(EntityCacheEvent),
    Relation(RelationCacheEvent),
}

impl From<EntityCacheEvent> for BusEvent {
    fn from(event: EntityCacheEvent) -> Self {
        BusEvent::Entity(event)
    }
}

impl From<RelationCacheEvent> for BusEvent {
    fn from(event: RelationCacheEvent) -> Self {
        BusEvent::Relation(event)
    }
}
