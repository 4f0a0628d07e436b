//! Server-push stream transport (§4.7): outbound-only over a long-lived
//! SSE response; inbound arrives as separate POSTs, one header marking a
//! protocol-data request (the envelope, as the request body) and a second
//! marking a request carrying base64 binary to pair with the envelope that
//! most recently arrived without one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::Mutex;

use haip_wire::{Envelope, Frame};

use crate::error::TransportError;
use crate::transport::Transport;

const CHANNEL_CAPACITY: usize = 64;

pub struct SseTransport {
    inbound_tx: tokio::sync::mpsc::Sender<Frame>,
    inbound_rx: Mutex<tokio::sync::mpsc::Receiver<Frame>>,
    outbound_tx: tokio::sync::mpsc::Sender<Frame>,
    outbound_rx: StdMutex<Option<tokio::sync::mpsc::Receiver<Frame>>>,
    pending_envelope: Mutex<Option<Envelope>>,
    closed: AtomicBool,
}

impl SseTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        Self {
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: StdMutex::new(Some(outbound_rx)),
            pending_envelope: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Handle a protocol-data POST: an envelope with no declared binary is
    /// delivered immediately, one that declares `bin_len` waits for the
    /// paired binary POST.
    pub async fn push_envelope(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if !envelope.expects_binary_frame() {
            return self.deliver(Frame::new(envelope)).await;
        }
        let mut pending = self.pending_envelope.lock().await;
        if pending.is_some() {
            return Err(TransportError::InvalidFrame(
                "an envelope awaiting its binary frame was superseded before it arrived".to_string(),
            ));
        }
        *pending = Some(envelope);
        Ok(())
    }

    /// Handle a binary POST: pairs with the envelope most recently pushed
    /// via [`Self::push_envelope`] that declared a binary frame.
    pub async fn push_binary(&self, base64_data: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let envelope = self
            .pending_envelope
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::InvalidFrame("binary frame arrived with no pending envelope".to_string()))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(base64_data)
            .map_err(|e| TransportError::InvalidFrame(format!("invalid base64 binary payload: {e}")))?;
        let frame = Frame::new(envelope).with_binary(data.into())?;
        self.deliver(frame).await
    }

    async fn deliver(&self, frame: Frame) -> Result<(), TransportError> {
        self.inbound_tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    /// Taken exactly once, when the SSE response body is built, to turn
    /// outbound frames into server-sent events.
    pub fn take_outbound_stream(&self) -> Option<tokio::sync::mpsc::Receiver<Frame>> {
        self.outbound_rx.lock().unwrap().take()
    }
}

impl Default for SseTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SseTransport {
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

/// Helper re-exported for `haip-server`'s binary frame extraction: returns
/// the paired binary, if any, as raw bytes alongside its declared MIME type.
pub fn binary_parts(frame: &Frame) -> Option<(&str, &[u8])> {
    frame.binary.as_ref().map(|b| (b.mime.as_str(), b.data.as_ref() as &[u8]))
}
