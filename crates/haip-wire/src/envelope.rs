//! The envelope: the unit of exchange for every event on the wire (§3, §6).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    decimal::DecimalU64,
    error::WireError,
    event_type::{Channel, EventType},
};

/// `{id, session, transaction|null, seq, ack?, ts, channel, type, payload,
/// pv?, crit?, bin_len?, bin_mime?, run_id?, thread_id?, related_id?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub session: String,
    #[serde(default)]
    pub transaction: Option<String>,
    pub seq: DecimalU64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ack: Option<DecimalU64>,
    pub ts: DecimalU64,
    pub channel: Channel,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pv: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub crit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bin_len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bin_mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub related_id: Option<String>,
}

impl Envelope {
    /// Whether this envelope declares a binary frame that must follow it.
    pub fn expects_binary_frame(&self) -> bool {
        self.bin_len.is_some() && self.bin_mime.is_some()
    }

    /// Whether the peer marked this envelope as critical (§4.1, §9).
    pub fn is_critical(&self) -> bool {
        self.crit.unwrap_or(false)
    }

    /// Approximate on-wire byte size, used by the flow controller to charge
    /// byte-credits (§4.3): the serialized envelope plus any paired binary.
    pub fn charged_bytes(&self) -> u64 {
        let envelope_len = serde_json::to_vec(self).map(|v| v.len() as u64).unwrap_or(0);
        envelope_len + self.bin_len.unwrap_or(0)
    }
}

/// A binary frame paired with the envelope that declared it (§4.1, §4.7).
#[derive(Debug, Clone)]
pub struct BinaryFrame {
    pub mime: String,
    pub data: bytes::Bytes,
}

/// An envelope together with its optional paired binary frame, the unit
/// upper layers (C6) actually operate on.
#[derive(Debug, Clone)]
pub struct Frame {
    pub envelope: Envelope,
    pub binary: Option<BinaryFrame>,
}

impl Frame {
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope, binary: None }
    }

    /// Attach a binary frame, validating it against the envelope's declared
    /// `bin_len`/`bin_mime` (§4.1).
    pub fn with_binary(mut self, data: bytes::Bytes) -> Result<Self, WireError> {
        let declared_len = self
            .envelope
            .bin_len
            .ok_or(WireError::UnpairedBinaryFrame)?;
        if data.len() as u64 != declared_len {
            return Err(WireError::BinaryLengthMismatch {
                expected: declared_len,
                actual: data.len() as u64,
            });
        }
        let mime = self
            .envelope
            .bin_mime
            .clone()
            .ok_or(WireError::UnpairedBinaryFrame)?;
        self.binary = Some(BinaryFrame { mime, data });
        Ok(self)
    }

    /// Validate that an envelope declaring a binary frame actually has one.
    pub fn validate_pairing(&self) -> Result<(), WireError> {
        if self.envelope.expects_binary_frame() && self.binary.is_none() {
            return Err(WireError::MissingBinaryFrame);
        }
        Ok(())
    }
}
