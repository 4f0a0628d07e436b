//! Bounded replay window of recently-sent envelopes (C2, §3, §4.2).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use haip_wire::Envelope;

use crate::error::SessionError;

#[derive(Debug)]
struct Entry {
    seq: u64,
    envelope: Envelope,
    inserted_at: Instant,
}

/// Ordered, bounded log of outbound envelopes keyed by sequence number.
///
/// Evicts entries older than `max_age` or once the window exceeds
/// `max_count`, whichever triggers first (§4.2).
#[derive(Debug)]
pub struct ReplayWindow {
    max_count: usize,
    max_age: Duration,
    entries: VecDeque<Entry>,
}

impl ReplayWindow {
    pub fn new(max_count: usize, max_age: Duration) -> Self {
        Self {
            max_count,
            max_age,
            entries: VecDeque::new(),
        }
    }

    /// Record an outbound envelope, evicting stale/overflowing entries.
    pub fn record(&mut self, seq: u64, envelope: Envelope, now: Instant) {
        self.entries.push_back(Entry {
            seq,
            envelope,
            inserted_at: now,
        });
        self.evict(now);
    }

    /// Drop entries older than `max_age` or beyond `max_count`.
    pub fn evict(&mut self, now: Instant) {
        while self.entries.len() > self.max_count {
            self.entries.pop_front();
        }
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.inserted_at) > self.max_age {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// The lowest sequence still held in the window, if any.
    pub fn floor(&self) -> Option<u64> {
        self.entries.front().map(|e| e.seq)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return the envelopes with sequence in `[from, to]` in original order.
    ///
    /// `to` defaults to the highest sequence currently in the window.
    pub fn slice(&self, from: u64, to: Option<u64>) -> Result<Vec<Envelope>, SessionError> {
        let Some(floor) = self.floor() else {
            return Err(SessionError::ReplayTooOld {
                floor: 0,
                requested: from,
            });
        };
        if from < floor {
            return Err(SessionError::ReplayTooOld {
                floor,
                requested: from,
            });
        }
        let to = to.unwrap_or_else(|| self.entries.back().map(|e| e.seq).unwrap_or(from));
        Ok(self
            .entries
            .iter()
            .filter(|e| e.seq >= from && e.seq <= to)
            .map(|e| e.envelope.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haip_wire::{Channel, CoreEventType, DecimalU64, EventType};
    use uuid::Uuid;

    fn envelope(seq: u64) -> Envelope {
        Envelope {
            id: Uuid::new_v4(),
            session: "s1".to_string(),
            transaction: None,
            seq: DecimalU64::new(seq),
            ack: None,
            ts: DecimalU64::new(0),
            channel: Channel::System,
            event_type: EventType::Core(CoreEventType::Info),
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

    #[test]
    fn replay_is_lossless_within_window() {
        let mut window = ReplayWindow::new(100, Duration::from_secs(300));
        let now = Instant::now();
        for seq in 1..=10u64 {
            window.record(seq, envelope(seq), now);
        }
        let slice = window.slice(7, None).unwrap();
        let seqs: Vec<u64> = slice.iter().map(|e| e.seq.get()).collect();
        assert_eq!(seqs, vec![7, 8, 9, 10]);
    }

    #[test]
    fn replay_below_floor_is_too_old() {
        let mut window = ReplayWindow::new(5, Duration::from_secs(300));
        let now = Instant::now();
        for seq in 1..=10u64 {
            window.record(seq, envelope(seq), now);
        }
        // Count-based eviction should have dropped 1..=5.
        assert_eq!(window.floor(), Some(6));
        let err = window.slice(1, None).unwrap_err();
        assert!(matches!(err, SessionError::ReplayTooOld { floor: 6, requested: 1 }));
    }

    #[test]
    fn age_based_eviction_drops_stale_entries() {
        let mut window = ReplayWindow::new(100, Duration::from_millis(10));
        let t0 = Instant::now();
        window.record(1, envelope(1), t0);
        let later = t0 + Duration::from_millis(50);
        window.record(2, envelope(2), later);
        assert_eq!(window.floor(), Some(2));
    }
}
