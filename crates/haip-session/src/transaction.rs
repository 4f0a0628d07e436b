//! Transaction lifecycle and registry (C4, §4.4).
//!
//! A transaction groups a bounded sequence of envelopes under one id. The
//! registry enforces id uniqueness and gives each transaction its own replay
//! window, independent of the session-level one, so a `REPLAY_REQUEST`
//! scoped to a transaction only ever replays that transaction's envelopes.
//! Transactions never hold a pointer back to the session or its registries —
//! only the (session id, transaction id) pair travels outward (§9 arena
//! design note).

use std::collections::HashMap;
use std::time::Instant;

use haip_wire::Envelope;

use crate::{config::ReplayConfig, error::SessionError, replay::ReplayWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Closed,
}

#[derive(Debug)]
pub struct Transaction {
    pub id: String,
    pub run_id: Option<uuid::Uuid>,
    state: TransactionState,
    replay: ReplayWindow,
}

impl Transaction {
    fn new(id: String, run_id: Option<uuid::Uuid>, replay: ReplayConfig) -> Self {
        Self {
            id,
            run_id,
            state: TransactionState::Open,
            replay: ReplayWindow::new(replay.max_count, replay.max_age),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    pub fn close(&mut self) {
        self.state = TransactionState::Closed;
    }

    pub fn record(&mut self, seq: u64, envelope: Envelope, now: Instant) {
        self.replay.record(seq, envelope, now);
    }

    pub fn slice(&self, from: u64, to: Option<u64>) -> Result<Vec<Envelope>, SessionError> {
        self.replay.slice(from, to)
    }
}

#[derive(Default)]
pub struct TransactionRegistry {
    transactions: HashMap<String, Transaction>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new transaction, rejecting a duplicate id outright (§4.4
    /// invariant: transaction ids are unique for the life of the session).
    pub fn open(
        &mut self,
        id: String,
        run_id: Option<uuid::Uuid>,
        replay: ReplayConfig,
    ) -> Result<&mut Transaction, SessionError> {
        if self.transactions.contains_key(&id) {
            return Err(SessionError::InvalidState);
        }
        let transaction = Transaction::new(id.clone(), run_id, replay);
        self.transactions.insert(id.clone(), transaction);
        Ok(self.transactions.get_mut(&id).expect("just inserted"))
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.transactions.get_mut(id)
    }

    /// Close a transaction; idempotent on an already-closed id.
    pub fn close(&mut self, id: &str) -> Result<(), SessionError> {
        let transaction = self.transactions.get_mut(id).ok_or(SessionError::InvalidState)?;
        transaction.close();
        Ok(())
    }

    pub fn open_count(&self) -> usize {
        self.transactions.values().filter(|t| t.is_open()).count()
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
            channel: Channel::User,
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
    fn duplicate_transaction_id_is_rejected() {
        let mut registry = TransactionRegistry::new();
        registry.open("t1".to_string(), None, ReplayConfig::default()).unwrap();
        let err = registry
            .open("t1".to_string(), None, ReplayConfig::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState));
    }

    #[test]
    fn closing_is_idempotent_and_unknown_id_errors() {
        let mut registry = TransactionRegistry::new();
        registry.open("t1".to_string(), None, ReplayConfig::default()).unwrap();
        registry.close("t1").unwrap();
        registry.close("t1").unwrap();
        assert!(registry.close("missing").is_err());
    }

    #[test]
    fn each_transaction_has_its_own_replay_window() {
        let mut registry = TransactionRegistry::new();
        let now = Instant::now();
        let t1 = registry.open("t1".to_string(), None, ReplayConfig::default()).unwrap();
        t1.record(1, envelope(1), now);
        let t2 = registry.open("t2".to_string(), None, ReplayConfig::default()).unwrap();
        assert!(t2.slice(1, None).is_err());
        assert_eq!(registry.get("t1").unwrap().slice(1, None).unwrap().len(), 1);
    }
}
