//! Chunked streaming transport (§4.7): a single POST whose body is a
//! newline-delimited stream of envelope JSON objects, binary payloads
//! inlined as base64 in the payload's `data` field. The response is the
//! symmetric outbound stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::Mutex;

use haip_wire::{codec, Frame};

use crate::error::TransportError;
use crate::transport::Transport;

const CHANNEL_CAPACITY: usize = 64;
const INLINE_DATA_FIELD: &str = "data";

pub struct ChunkedStreamTransport {
    inbound_tx: tokio::sync::mpsc::Sender<Frame>,
    inbound_rx: Mutex<tokio::sync::mpsc::Receiver<Frame>>,
    outbound_tx: tokio::sync::mpsc::Sender<Frame>,
    outbound_rx: StdMutex<Option<tokio::sync::mpsc::Receiver<Frame>>>,
    line_buffer: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl ChunkedStreamTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        Self {
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: StdMutex::new(Some(outbound_rx)),
            line_buffer: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Feed a chunk of the request body; complete lines are decoded and
    /// delivered to [`Transport::recv`] as they're found.
    pub async fn push_bytes(&self, chunk: Bytes) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut buffer = self.line_buffer.lock().await;
        buffer.extend_from_slice(&chunk);
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            let text = std::str::from_utf8(line)
                .map_err(|e| TransportError::InvalidFrame(format!("non-UTF-8 line: {e}")))?;
            let frame = decode_inline_frame(text)?;
            self.inbound_tx.send(frame).await.map_err(|_| TransportError::Closed)?;
        }
        Ok(())
    }

    pub fn take_outbound_stream(&self) -> Option<tokio::sync::mpsc::Receiver<Frame>> {
        self.outbound_rx.lock().unwrap().take()
    }
}

impl Default for ChunkedStreamTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ChunkedStreamTransport {
    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.outbound_tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Serialize a frame as one NDJSON line, inlining any binary as base64 in
/// `payload.data`.
pub fn encode_inline_frame(frame: &Frame) -> Result<String, TransportError> {
    let mut envelope = frame.envelope.clone();
    if let Some(binary) = &frame.binary {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&binary.data);
        envelope.payload.insert(INLINE_DATA_FIELD.to_string(), Value::String(encoded));
    }
    Ok(codec::encode(&envelope)?)
}

/// Parse one NDJSON line back into a frame, pulling any inline `payload.data`
/// out into the paired binary frame and stripping it from the payload.
fn decode_inline_frame(line: &str) -> Result<Frame, TransportError> {
    let mut envelope = codec::decode(line)?;
    let Some(inline) = envelope.payload.remove(INLINE_DATA_FIELD) else {
        return Ok(Frame::new(envelope));
    };
    let Value::String(encoded) = inline else {
        return Err(TransportError::InvalidFrame("payload.data must be a base64 string".to_string()));
    };
    let data = base64::engine::general_purpose::STANDARD
        .decode(&encoded)
        .map_err(|e| TransportError::InvalidFrame(format!("invalid base64 binary payload: {e}")))?;
    if envelope.bin_len.is_none() {
        envelope.bin_len = Some(data.len() as u64);
    }
    Frame::new(envelope).with_binary(data.into()).map_err(TransportError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haip_wire::{Channel, CoreEventType, Envelope, EventType};
    use uuid::Uuid;

    fn plain_envelope() -> Envelope {
        Envelope {
            id: Uuid::new_v4(),
            session: "s1".to_string(),
            transaction: None,
            seq: 1u64.into(),
            ack: None,
            ts: 0u64.into(),
            channel: Channel::User,
            event_type: EventType::Core(CoreEventType::Ping),
            payload: serde_json::Map::new(),
            pv: None,
            crit: None,
            bin_len: None,
            bin_mime: None,
            run_id: None,
            thread_id: None,
            related_id: None,
        }
    }

    #[tokio::test]
    async fn a_single_complete_line_is_delivered() {
        let transport = ChunkedStreamTransport::new();
        let line = codec::encode(&plain_envelope()).unwrap();
        transport.push_bytes(Bytes::from(format!("{line}\n"))).await.unwrap();
        let frame = transport.recv().await.unwrap();
        assert_eq!(frame.envelope.event_type, EventType::Core(CoreEventType::Ping));
    }

    #[tokio::test]
    async fn a_line_split_across_chunks_is_reassembled() {
        let transport = ChunkedStreamTransport::new();
        let line = codec::encode(&plain_envelope()).unwrap();
        let (first, second) = line.split_at(line.len() / 2);
        transport.push_bytes(Bytes::from(first.to_string())).await.unwrap();
        transport.push_bytes(Bytes::from(format!("{second}\n"))).await.unwrap();
        let frame = transport.recv().await.unwrap();
        assert_eq!(frame.envelope.event_type, EventType::Core(CoreEventType::Ping));
    }

    #[tokio::test]
    async fn inline_binary_round_trips_through_encode_and_decode() {
        let mut envelope = plain_envelope();
        envelope.bin_len = Some(3);
        envelope.bin_mime = Some("application/octet-stream".to_string());
        let frame = Frame::new(envelope).with_binary(Bytes::from_static(&[9, 8, 7])).unwrap();
        let line = encode_inline_frame(&frame).unwrap();
        let decoded = decode_inline_frame(&line).unwrap();
        assert_eq!(decoded.binary.unwrap().data.as_ref(), &[9, 8, 7]);
        assert!(!decoded.envelope.payload.contains_key(INLINE_DATA_FIELD));
    }
}
