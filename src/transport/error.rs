//! Transport error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport connect failed: {0}")]
    Connect(String),

    #[error("transport send failed: {0}")]
    Send(String),

    #[error("subscription closed")]
    Closed,

    #[error("destination already subscribed")]
    AlreadySubscribed,
}
