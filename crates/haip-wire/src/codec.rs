//! Encode/decode/validate the envelope (C1, §4.1).

use std::collections::HashSet;

use crate::{envelope::Envelope, error::WireError};

/// Decode a single envelope from its JSON text form.
///
/// Malformed JSON and missing required fields both surface as
/// [`WireError::MalformedJson`] / structurally-derived serde errors, which
/// the caller maps to `PROTOCOL_VIOLATION` via [`WireError::error_code`].
pub fn decode(text: &str) -> Result<Envelope, WireError> {
    serde_json::from_str(text).map_err(WireError::from)
}

/// Encode an envelope to its JSON wire form.
pub fn encode(envelope: &Envelope) -> Result<String, WireError> {
    serde_json::to_string(envelope).map_err(WireError::from)
}

/// What to do with an inbound envelope given the peer's negotiated
/// accept-list (§3 invariant, §4.1, §9 ambiguity #1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptDecision {
    /// The event type is in the accept-list (or is a reserved/unknown type
    /// without the critical flag): proceed with normal routing.
    Accept,
    /// An unknown event type arrived without the critical flag: drop it
    /// silently for forward-compatibility.
    Ignore,
    /// An unknown, or not-accepted, event type arrived with the critical
    /// flag set: reject with `UNSUPPORTED_TYPE`.
    Reject,
}

/// Decide what to do with an inbound envelope per the accept-list and
/// critical-flag rules.
pub fn decide_acceptance(envelope: &Envelope, accept_list: &HashSet<String>) -> AcceptDecision {
    let type_name = envelope.event_type.as_str();
    if accept_list.contains(type_name) {
        return AcceptDecision::Accept;
    }
    if envelope.is_critical() {
        AcceptDecision::Reject
    } else {
        AcceptDecision::Ignore
    }
}
