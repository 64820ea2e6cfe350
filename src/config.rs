//! Configuration surface (spec §6): two keys, layered loading, hot reload.
//!
//! Follows the teacher's `FileConfig` → resolved `Config` shape
//! (`core/config.rs`) at a scale appropriate to two keys: defaults,
//! overridable by environment variables, resolved once into a plain
//! `BusConfig` struct that the rest of the crate reads by value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_KEY_DELIVERY_MODE, CONFIG_KEY_MAXIMUM_RELATION_SIZE, DEFAULT_MAXIMUM_RELATION_SIZE,
    ENV_PREFIX,
};

/// Transport durability selector applied per published envelope (spec §6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Slow or briefly disconnected peers do not miss events.
    #[default]
    Persistent,
    /// Operators accept event loss in exchange for throughput.
    NonPersistent,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Persistent => write!(f, "persistent"),
            DeliveryMode::NonPersistent => write!(f, "non_persistent"),
        }
    }
}

impl DeliveryMode {
    fn parse(raw: &str) -> Self {
        match raw.to_lowercase().replace('-', "_").as_str() {
            "non_persistent" | "nonpersistent" => DeliveryMode::NonPersistent,
            _ => DeliveryMode::Persistent,
        }
    }
}

/// Resolved runtime configuration (spec §4.1 `configure(props)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Bulk relation payloads larger than this degrade to `RESET` (spec §4.4).
    pub maximum_relation_size: usize,
    pub delivery_mode: DeliveryMode,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            maximum_relation_size: DEFAULT_MAXIMUM_RELATION_SIZE,
            delivery_mode: DeliveryMode::default(),
        }
    }
}

impl BusConfig {
    /// Load defaults overridden by `CACHEBUS_*` environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .set_default(
                "maximum_relation_size",
                DEFAULT_MAXIMUM_RELATION_SIZE as i64,
            )?
            .set_default("delivery_mode", DeliveryMode::default().to_string())?
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    // Keys here are flat (`maximum_relation_size`), not
                    // nested, so the nesting separator is set to
                    // something that never appears in a key rather than
                    // the default "_" — otherwise `CACHEBUS_MAXIMUM_RELATION_SIZE`
                    // would split into a nested `maximum.relation.size`
                    // path instead of matching the flat key below.
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let maximum_relation_size = built.get_int("maximum_relation_size")? as usize;
        let delivery_mode = DeliveryMode::parse(&built.get_string("delivery_mode")?);

        Ok(Self {
            maximum_relation_size,
            delivery_mode,
        })
    }

    /// Resolve from a generic properties map, as passed to
    /// `configure(props)` by an embedding application's reload hook.
    /// Missing or unparsable keys fall back to defaults — a reload should
    /// never be able to crash the bus (spec §4.1: "Re-reading at runtime is
    /// permitted").
    pub fn from_props(props: &HashMap<String, String>) -> Self {
        let maximum_relation_size = props
            .get(CONFIG_KEY_MAXIMUM_RELATION_SIZE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAXIMUM_RELATION_SIZE);
        let delivery_mode = props
            .get(CONFIG_KEY_DELIVERY_MODE)
            .map(|v| DeliveryMode::parse(v))
            .unwrap_or_default();
        Self {
            maximum_relation_size,
            delivery_mode,
        }
    }
}

/// Anything that wants to hear about a configuration reload.
///
/// The manager implements this and registers itself with a
/// [`ConfigRegistry`] (spec §4.1: "registers itself as a configurable so it
/// is reconfigured when global configuration reloads"). Driving
/// `notify_all` on an actual reload is the embedding application's job —
/// out of scope per spec §1.
pub trait Configurable: Send + Sync {
    fn configure(&self, config: &BusConfig);
}

/// Subscriber list for configuration reloads, grounded in the
/// `Mutex<Vec<_>>` shape the teacher uses for its shutdown task registry
/// (`core/shutdown.rs`).
#[derive(Default)]
pub struct ConfigRegistry {
    subscribers: Mutex<Vec<Arc<dyn Configurable>>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, configurable: Arc<dyn Configurable>) {
        self.subscribers.lock().push(configurable);
    }

    pub fn notify_all(&self, config: &BusConfig) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.configure(config);
        }
    }
}
