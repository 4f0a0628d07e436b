//! Transport-level errors (§4.7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error(transparent)]
    Wire(#[from] haip_wire::WireError),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
