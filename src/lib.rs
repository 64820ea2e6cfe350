//! Distributed cache coherence bus: a pub/sub-based invalidation and
//! update broadcast layer for a multi-instance application's local
//! entity and relation caches.
//!
//! Each process maintains its own in-memory caches; this crate keeps
//! them approximately consistent across the fleet by translating local
//! mutations into a compact wire vocabulary ([`message`]), broadcasting
//! them over a shared topic ([`publisher`], [`subscriber`]), and
//! replaying them on every other instance ([`applier`]) while avoiding
//! self-originated loops and oversized bulk payloads ([`translator`]).
//!
//! The transport and the local entity store are external collaborators:
//! see [`transport`] and [`store`] for the trait boundaries a production
//! embedder implements, plus the in-memory reference backend each ships
//! for standalone use and testing.

pub mod applier;
pub mod config;
pub mod constants;
pub mod error;
pub mod manager;
pub mod message;
pub mod publisher;
pub mod store;
pub mod subscriber;
pub mod transport;
pub mod translator;

pub use applier::Applier;
pub use config::{BusConfig, ConfigRegistry, Configurable, DeliveryMode};
pub use constants::{CACHE_TOPIC, SENDER_ID_PROPERTY};
pub use error::BusError;
pub use manager::CacheMessageManager;
pub use message::{BusEvent, EntityCacheEvent, RelationCacheEvent};
pub use publisher::Publisher;
pub use store::{CachedRelation, EntityGroup, EntityStore};
pub use subscriber::AsyncSubscriber;
pub use translator::Translator;
