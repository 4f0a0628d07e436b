//! Server-level errors (§10 A2: one `thiserror` enum per crate).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("connection rejected: authentication failed")]
    Unauthenticated,

    #[error("connection rejected: at capacity ({max_connections} connections)")]
    AtCapacity { max_connections: usize },

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Transport(#[from] haip_transport::TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
