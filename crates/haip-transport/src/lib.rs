//! Transport adapters (C7, §4.7): three ways a peer can carry envelopes to
//! and from the session engine, all behind the one [`Transport`] trait.

pub mod error;
pub mod memory;
pub mod sse;
pub mod stream_post;
pub mod transport;
pub mod websocket;

pub use error::TransportError;
pub use memory::MemoryTransport;
pub use sse::SseTransport;
pub use stream_post::ChunkedStreamTransport;
pub use transport::Transport;
pub use websocket::WebSocketTransport;
