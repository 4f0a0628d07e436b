//! Wire types and codec for the HAIP protocol (C1, §3, §4.1, §6).
//!
//! This crate owns the envelope shape, the closed event-type set, the
//! decimal-string u64 encoding used for 64-bit counters, and the error-code
//! taxonomy. It has no knowledge of sessions, transactions, or transports —
//! those live in `haip-session` and `haip-transport`.

pub mod codec;
pub mod decimal;
pub mod envelope;
pub mod error;
pub mod event_type;

pub use codec::{decide_acceptance, decode, encode, AcceptDecision};
pub use decimal::{DecimalParseError, DecimalU64};
pub use envelope::{BinaryFrame, Envelope, Frame};
pub use error::{ErrorCode, WireError};
pub use event_type::{Channel, CoreEventType, EventType};
