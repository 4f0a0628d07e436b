//! The handle a tool handler gets instead of a back-pointer to the session.
//!
//! Per the arena design note (§9): handlers receive `(sessionId,
//! transactionId, sendFn)` and never touch the session directly.

use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;

use haip_wire::{Channel, Envelope, EventType};

pub type SendFn = Arc<dyn Fn(Envelope) + Send + Sync>;

#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub transaction_id: String,
    pub run_id: Uuid,
    send: SendFn,
}

impl ToolContext {
    pub fn new(session_id: String, transaction_id: String, run_id: Uuid, send: SendFn) -> Self {
        Self {
            session_id,
            transaction_id,
            run_id,
            send,
        }
    }

    /// Emit an envelope on the AGENT channel, stamped with this context's
    /// transaction and run ids. The session's outbound frame pump assigns
    /// the real sequence number and charges flow control.
    pub fn emit(&self, event_type: EventType, payload: Map<String, serde_json::Value>) {
        let mut envelope = blank_envelope(self.session_id.clone(), Channel::Agent, event_type, payload);
        envelope.transaction = Some(self.transaction_id.clone());
        envelope.run_id = Some(self.run_id);
        (self.send)(envelope);
    }
}

/// Sequence/timestamp are left at their zero defaults — the session engine
/// rewrites them before this ever reaches the wire. See `haip-server`'s
/// `ForwardToTool`/tool-callback wiring.
fn blank_envelope(session_id: String, channel: Channel, event_type: EventType, payload: Map<String, serde_json::Value>) -> Envelope {
    Envelope {
        id: Uuid::new_v4(),
        session: session_id,
        transaction: None,
        seq: 0u64.into(),
        ack: None,
        ts: 0u64.into(),
        channel,
        event_type,
        payload,
        pv: None,
        crit: None,
        bin_len: None,
        bin_mime: None,
        run_id: None,
        thread_id: None,
        related_id: None,
    }
}
