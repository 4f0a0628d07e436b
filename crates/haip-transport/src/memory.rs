//! An in-process loopback transport for tests (§10: this repository's own
//! minimal substitute for depending on an external in-memory transport).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use haip_wire::Frame;

use crate::error::TransportError;
use crate::transport::Transport;

const CHANNEL_CAPACITY: usize = 64;

pub struct MemoryTransport {
    tx: mpsc::Sender<Frame>,
    rx: Mutex<mpsc::Receiver<Frame>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Build a connected pair: frames sent on one side arrive on the other.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Arc::new(Self {
                tx: tx_b,
                rx: Mutex::new(rx_a),
                closed: AtomicBool::new(false),
            }),
            Arc::new(Self {
                tx: tx_a,
                rx: Mutex::new(rx_b),
                closed: AtomicBool::new(false),
            }),
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn recv(&self) -> Result<Frame, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
