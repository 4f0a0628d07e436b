//! Wire-level errors and the protocol error-code taxonomy.
//!
//! [`ErrorCode`] is the closed set from the wire contract (§6/§7); it is the
//! single place an internal failure turns into something the peer can see in
//! an `ERROR` envelope. [`WireError`] is the Rust-side error for this crate's
//! own fallible operations (decode, validation).

use thiserror::Error;

/// Closed set of protocol error codes carried in `ERROR` envelope payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ProtocolViolation,
    SeqViolation,
    FlowControlViolation,
    VersionIncompatible,
    RunLimitExceeded,
    ReplayTooOld,
    UnsupportedType,
    ResumeFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProtocolViolation => "PROTOCOL_VIOLATION",
            Self::SeqViolation => "SEQ_VIOLATION",
            Self::FlowControlViolation => "FLOW_CONTROL_VIOLATION",
            Self::VersionIncompatible => "VERSION_INCOMPATIBLE",
            Self::RunLimitExceeded => "RUN_LIMIT_EXCEEDED",
            Self::ReplayTooOld => "REPLAY_TOO_OLD",
            Self::UnsupportedType => "UNSUPPORTED_TYPE",
            Self::ResumeFailed => "RESUME_FAILED",
        }
    }

    /// Whether this error code requires the session to close per §7.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation
                | Self::SeqViolation
                | Self::FlowControlViolation
                | Self::VersionIncompatible
                | Self::UnsupportedType
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding or validating envelopes.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field '{field}' is not a valid decimal-string u64: {value}")]
    InvalidDecimalU64 { field: &'static str, value: String },

    #[error("unsupported event type '{0}' (critical)")]
    UnsupportedCriticalType(String),

    #[error("envelope declares bin_len/bin_mime but no binary frame followed")]
    MissingBinaryFrame,

    #[error("binary frame length {actual} does not match declared bin_len {expected}")]
    BinaryLengthMismatch { expected: u64, actual: u64 },

    #[error("a binary frame arrived without a preceding envelope declaring bin_len")]
    UnpairedBinaryFrame,
}

impl WireError {
    /// Map a decode-time failure to the wire error code it should surface as.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MalformedJson(_) | Self::MissingField(_) | Self::InvalidDecimalU64 { .. } => {
                ErrorCode::ProtocolViolation
            }
            Self::UnsupportedCriticalType(_) => ErrorCode::UnsupportedType,
            Self::MissingBinaryFrame | Self::BinaryLengthMismatch { .. } | Self::UnpairedBinaryFrame => {
                ErrorCode::ProtocolViolation
            }
        }
    }
}
