//! Credit-based flow control (C3, §4.3).
//!
//! Every channel carries two independent ledgers on each side of the
//! connection: the credit *we grant the peer* to send to us
//! (`inbound`, decremented when the peer sends), and the credit *the peer
//! granted us* to send to them (`outbound`, decremented when we send and
//! topped up by an incoming `FLOW_UPDATE`). When our grant to the peer runs
//! low we proactively top it up and announce the new total with an outbound
//! `FLOW_UPDATE`, provided the top-up is actually large enough to clear the
//! low-water mark; when our own outbound credit is exhausted we queue rather
//! than send, and drain the queue once the peer tops us up in turn.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use haip_wire::{Channel, Envelope};

use crate::{config::FlowControlConfig, error::SessionError};

#[derive(Debug, Clone, Copy, Default)]
pub struct Ledger {
    pub messages: u64,
    pub bytes: u64,
}

impl Ledger {
    fn is_exhausted(&self) -> bool {
        self.messages == 0 || self.bytes == 0
    }

    fn below_threshold(&self, threshold: u64) -> bool {
        self.messages <= threshold || self.bytes <= threshold
    }
}

/// A newly-issued grant to announce to the peer via `FLOW_UPDATE`.
#[derive(Debug, Clone, Copy)]
pub struct FlowGrant {
    pub channel: Channel,
    pub messages: u64,
    pub bytes: u64,
}

pub struct FlowController {
    config: FlowControlConfig,
    inbound: HashMap<Channel, Ledger>,
    outbound: HashMap<Channel, Ledger>,
    outbound_queue: HashMap<Channel, VecDeque<Envelope>>,
    last_rtt: Option<Duration>,
}

impl FlowController {
    /// Initialise both ledgers from the peer's advertised initial credits,
    /// clamped to the server's configured bounds (§4.3).
    pub fn new(config: FlowControlConfig, peer_initial_messages: u64, peer_initial_bytes: u64) -> Self {
        let messages = peer_initial_messages.clamp(config.min_credits, config.max_credits);
        let bytes = peer_initial_bytes.clamp(config.min_credits, config.max_credits);
        let mut inbound = HashMap::new();
        let mut outbound = HashMap::new();
        let mut outbound_queue = HashMap::new();
        for channel in Channel::ALL {
            inbound.insert(channel, Ledger { messages, bytes });
            outbound.insert(channel, Ledger { messages, bytes });
            outbound_queue.insert(channel, VecDeque::new());
        }
        Self {
            config,
            inbound,
            outbound,
            outbound_queue,
            last_rtt: None,
        }
    }

    pub fn inbound_ledger(&self, channel: Channel) -> Ledger {
        self.inbound.get(&channel).copied().unwrap_or_default()
    }

    pub fn outbound_ledger(&self, channel: Channel) -> Ledger {
        self.outbound.get(&channel).copied().unwrap_or_default()
    }

    /// Charge the credit we granted the peer for an inbound envelope.
    ///
    /// Returns `Err` if the peer sent while already paused on this channel
    /// (`FLOW_CONTROL_VIOLATION`); otherwise returns an optional new grant
    /// to announce if the ledger dropped to/below the refill threshold.
    ///
    /// The refill is applied to the same ledger that gates violations only
    /// when it actually clears the low-water mark (`refill > credit_threshold`
    /// on that field). A refill no bigger than the threshold would leave the
    /// ledger below threshold again on the very next charge, perpetually
    /// re-triggering — so instead of instantly re-crediting the floor, it's
    /// left alone and allowed to reach zero, at which point a peer that
    /// keeps sending past its budget gets a real `FLOW_CONTROL_VIOLATION`.
    pub fn charge_inbound(&mut self, channel: Channel, bytes: u64) -> Result<Option<FlowGrant>, SessionError> {
        let ledger = self.inbound.entry(channel).or_default();
        if ledger.is_exhausted() {
            return Err(SessionError::FlowControlViolation(channel.to_string()));
        }
        ledger.messages = ledger.messages.saturating_sub(1);
        ledger.bytes = ledger.bytes.saturating_sub(bytes);

        if !ledger.below_threshold(self.config.credit_threshold) {
            return Ok(None);
        }

        let (refill_messages, refill_bytes) = self.refill_amount();
        let threshold = self.config.credit_threshold;
        let mut granted = false;
        let ledger = self.inbound.entry(channel).or_default();
        if refill_messages > threshold {
            ledger.messages = refill_messages.min(self.config.max_credits);
            granted = true;
        }
        if refill_bytes > threshold {
            ledger.bytes = refill_bytes.min(self.config.max_credits);
            granted = true;
        }

        if granted {
            Ok(Some(FlowGrant {
                channel,
                messages: ledger.messages,
                bytes: ledger.bytes,
            }))
        } else {
            Ok(None)
        }
    }

    /// Try to charge our own outbound credit for a send on `channel`.
    /// Returns `true` if the send may proceed now, `false` if it must queue.
    pub fn try_charge_outbound(&mut self, channel: Channel, bytes: u64) -> bool {
        let ledger = self.outbound.entry(channel).or_default();
        if ledger.is_exhausted() {
            return false;
        }
        ledger.messages = ledger.messages.saturating_sub(1);
        ledger.bytes = ledger.bytes.saturating_sub(bytes);
        true
    }

    pub fn is_paused(&self, channel: Channel) -> bool {
        self.outbound_ledger(channel).is_exhausted()
    }

    pub fn enqueue(&mut self, channel: Channel, envelope: Envelope) {
        self.outbound_queue.entry(channel).or_default().push_back(envelope);
    }

    pub fn queue_len(&self, channel: Channel) -> usize {
        self.outbound_queue.get(&channel).map(VecDeque::len).unwrap_or(0)
    }

    /// Apply a `FLOW_UPDATE` received from the peer, then drain as much of
    /// the queue for that channel as the new credit allows, in order.
    pub fn apply_peer_flow_update(&mut self, channel: Channel, messages: u64, bytes: u64) -> Vec<Envelope> {
        {
            let ledger = self.outbound.entry(channel).or_default();
            ledger.messages = ledger.messages.saturating_add(messages);
            ledger.bytes = ledger.bytes.saturating_add(bytes);
        }
        let mut drained = Vec::new();
        while let Some(front) = self.outbound_queue.get(&channel).and_then(|q| q.front()) {
            let charged_bytes = front.charged_bytes();
            if self.try_charge_outbound(channel, charged_bytes) {
                let envelope = self
                    .outbound_queue
                    .get_mut(&channel)
                    .and_then(|q| q.pop_front())
                    .expect("front already peeked");
                drained.push(envelope);
            } else {
                break;
            }
        }
        drained
    }

    pub fn record_rtt(&mut self, rtt: Duration) {
        self.last_rtt = Some(rtt);
    }

    /// Compute the (messages, bytes) refill size, scaled by observed RTT
    /// when adaptive adjustment is enabled (§4.3): slower round trips get
    /// bigger grants so the peer doesn't stall waiting on the next refill.
    fn refill_amount(&self) -> (u64, u64) {
        let base_messages = self.config.initial_credit_messages;
        let base_bytes = self.config.initial_credit_bytes;
        if !self.config.adaptive_adjustment {
            return (base_messages, base_bytes);
        }
        let factor = match self.last_rtt {
            Some(rtt) => 1.0 + (rtt.as_millis() as f64 / 100.0),
            None => 1.0,
        };
        let scaled_messages = ((base_messages as f64) * factor) as u64;
        let scaled_bytes = ((base_bytes as f64) * factor) as u64;
        (scaled_messages, scaled_bytes)
    }
}
