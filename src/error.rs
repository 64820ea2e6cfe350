//! Top-level error type for the bus manager.
//!
//! Per-layer errors (`TransportError`, `StoreError`) live next to the
//! modules that raise them, matching the teacher's per-layer error types
//! rather than one crate-wide catch-all. This type exists only for the
//! handful of calls that can fail across layers (connect/configure).

use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("bus is not connected")]
    NotConnected,
}
