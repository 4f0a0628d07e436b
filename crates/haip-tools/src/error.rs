//! Tool-dispatch errors (§4.5, §7: contained to the owning transaction).

use haip_wire::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{tool}' failed: {message}")]
    HandlerFailed { tool: String, message: String },

    #[error("tool '{tool}' was cancelled")]
    Cancelled { tool: String },

    #[error("tool '{tool}' did not reach a terminal state within {grace_ms}ms")]
    GraceExceeded { tool: String, grace_ms: u64 },
}

impl ToolError {
    /// Tool-handler failures never close the session (§4.8): they always
    /// surface as `PROTOCOL_VIOLATION`-shaped detail on the owning
    /// transaction, never as a session-fatal error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnknownTool(_) => ErrorCode::ProtocolViolation,
            Self::HandlerFailed { .. } | Self::Cancelled { .. } | Self::GraceExceeded { .. } => {
                ErrorCode::ProtocolViolation
            }
        }
    }
}
