//! Wire constants and configuration keys/defaults

// =============================================================================
// Transport wire constants
// =============================================================================

/// Fixed destination name all publishers/subscribers bind to.
pub const CACHE_TOPIC: &str = "CACHE.TOPIC";

/// Message property carrying the originating instance's client identifier.
///
/// Conformant peers stamp this on every outbound envelope; the applier
/// drops any envelope missing it (spec §4.5 step 4, §7).
pub const SENDER_ID_PROPERTY: &str = "Gemini.CacheMgr.ClientUUID";

// =============================================================================
// Configuration keys (see core config surface, spec §6)
// =============================================================================

pub const CONFIG_KEY_MAXIMUM_RELATION_SIZE: &str = "CacheMessageManager.MaximumRelationSize";
pub const CONFIG_KEY_DELIVERY_MODE: &str = "CacheMessageManager.DeliveryMode";

/// Environment variable prefix used by the layered config loader.
pub const ENV_PREFIX: &str = "CACHEBUS";

pub const DEFAULT_MAXIMUM_RELATION_SIZE: usize = 10_000;
