//! Bidirectional socket transport (§4.7): one text message per envelope,
//! an immediately-following binary message iff the envelope declared
//! `bin_len`/`bin_mime`. Interleaving a binary frame with any other
//! envelope's binary is rejected by strict pairing.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use haip_wire::{codec, Frame};

use crate::error::TransportError;
use crate::transport::Transport;

pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: AtomicBool,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            if self.is_closed() {
                return Err(TransportError::Closed);
            }
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(_)) | None => {
                    self.close();
                    return Err(TransportError::Closed);
                }
            };
            match message {
                Message::Text(text) => {
                    let envelope = codec::decode(text.as_str())?;
                    if !envelope.expects_binary_frame() {
                        return Ok(Frame::new(envelope));
                    }
                    let binary = match stream.next().await {
                        Some(Ok(Message::Binary(data))) => data,
                        _ => {
                            return Err(TransportError::InvalidFrame(
                                "expected a binary frame to follow the envelope".to_string(),
                            ))
                        }
                    };
                    return Frame::new(envelope).with_binary(binary).map_err(TransportError::from);
                }
                Message::Binary(_) => {
                    return Err(TransportError::InvalidFrame(
                        "binary frame arrived without a preceding envelope".to_string(),
                    ))
                }
                Message::Close(_) => {
                    self.close();
                    return Err(TransportError::Closed);
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
    }

    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let text = codec::encode(&frame.envelope)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|_| TransportError::Closed)?;
        if let Some(binary) = frame.binary {
            sink.send(Message::Binary(binary.data))
                .await
                .map_err(|_| TransportError::Closed)?;
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
