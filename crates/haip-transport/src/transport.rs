//! The uniform duplex interface C6 drives regardless of which adapter is
//! underneath (§4.7).
//!
//! Implementations use interior mutability (`&self`, not `&mut self`) so a
//! single transport handle can be shared between the session's inbound and
//! outbound tasks (§5): one task only ever calls `recv`, the other only
//! ever calls `send`.

use async_trait::async_trait;

use haip_wire::Frame;

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Block until the next frame arrives from the peer, in the exact order
    /// it was sent.
    async fn recv(&self) -> Result<Frame, TransportError>;

    /// Deliver `frame` to the peer. Adapters must preserve submission order.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Best-effort close; safe to call more than once.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
