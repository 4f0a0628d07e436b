//! Session-engine errors (§7).

use haip_wire::{ErrorCode, WireError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("sequence violation: expected {expected}, got {got}")]
    SeqViolation { expected: u64, got: u64 },

    #[error("flow control violation on channel {0}")]
    FlowControlViolation(String),

    #[error("no common protocol major version")]
    VersionIncompatible,

    #[error("active run count would exceed the negotiated maximum of {0}")]
    RunLimitExceeded(usize),

    #[error("replay requested below window floor {floor}: requested {requested}")]
    ReplayTooOld { floor: u64, requested: u64 },

    #[error("unsupported event type: {0}")]
    UnsupportedType(String),

    #[error("permission denied for event type {event_type} on channel {channel}")]
    PermissionDenied { event_type: String, channel: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("session is not in a state that accepts this event")]
    InvalidState,
}

impl SessionError {
    /// Map this error to the wire error code it should surface as (§7).
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Wire(e) => e.error_code(),
            Self::SeqViolation { .. } => ErrorCode::SeqViolation,
            Self::FlowControlViolation(_) => ErrorCode::FlowControlViolation,
            Self::VersionIncompatible => ErrorCode::VersionIncompatible,
            Self::RunLimitExceeded(_) => ErrorCode::RunLimitExceeded,
            Self::ReplayTooOld { .. } => ErrorCode::ReplayTooOld,
            Self::UnsupportedType(_) => ErrorCode::UnsupportedType,
            Self::PermissionDenied { .. } | Self::UnknownTool(_) | Self::InvalidState => {
                ErrorCode::ProtocolViolation
            }
        }
    }

    /// Whether this error closes the session per the §7 taxonomy.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RunLimitExceeded(_) | Self::ReplayTooOld { .. })
    }
}
