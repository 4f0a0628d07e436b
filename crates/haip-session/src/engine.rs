//! The session state machine (C6, §4.6): a pure function from `(inbound
//! frame, clock)` to `(new state, outbound actions)`. No I/O, no async, no
//! knowledge of transports — `haip-server` drives this from its connection
//! tasks and acts on the returned [`Action`]s.
//!
//! The engine takes both a monotonic [`Instant`] (for timeouts and replay
//! aging) and the caller-supplied wall-clock milliseconds (for the `ts`
//! wire field) on every call, rather than reading the clock itself, so it
//! stays deterministic and unit-testable.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::{Map, Value};
use uuid::Uuid;

use haip_auth::Principal;
use haip_wire::{
    decide_acceptance, AcceptDecision, Channel, CoreEventType, DecimalU64, Envelope, ErrorCode,
    EventType, Frame,
};

use crate::{
    catalog::ToolCatalog,
    config::EngineConfig,
    error::SessionError,
    flow::FlowController,
    replay::ReplayWindow,
    run::RunRegistry,
    sequence::{SeqOutcome, SequenceTracker},
    transaction::TransactionRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active,
    Closed,
}

/// Something the engine wants the driving task to do.
#[derive(Debug, Clone)]
pub enum Action {
    /// Hand this frame to the transport for delivery.
    Transmit(Frame),
    /// Close the underlying connection with this protocol-level reason.
    Close { code: ErrorCode, message: String },
    /// Start executing `tool_name` for this run; input is the
    /// `TRANSACTION_START` payload's `input` field.
    InvokeTool {
        run_id: Uuid,
        transaction_id: String,
        tool_name: String,
        input: Value,
    },
    /// Forward a message/audio envelope to the tool already running for
    /// this transaction.
    ForwardToTool {
        run_id: Uuid,
        transaction_id: String,
        envelope: Envelope,
    },
    /// The peer asked to cancel a run in progress.
    CancelTool { run_id: Uuid },
}

pub struct SessionEngine {
    session_id: String,
    state: SessionState,
    config: EngineConfig,
    principal: Principal,
    catalog: std::sync::Arc<dyn ToolCatalog>,
    accept_list: HashSet<String>,

    sequence: SequenceTracker,
    replay: ReplayWindow,
    flow: Option<FlowController>,
    transactions: TransactionRegistry,
    runs: RunRegistry,

    missed_heartbeats: u32,
    last_heartbeat_sent: Option<Instant>,
    awaiting_pong: bool,
}

impl SessionEngine {
    pub fn new(
        session_id: String,
        config: EngineConfig,
        principal: Principal,
        catalog: std::sync::Arc<dyn ToolCatalog>,
    ) -> Self {
        let accept_list = CoreEventType::ALL.iter().map(|t| t.as_str().to_string()).collect();
        let replay = ReplayWindow::new(config.replay.max_count, config.replay.max_age);
        Self {
            session_id,
            state: SessionState::AwaitingHandshake,
            runs: RunRegistry::new(config.max_concurrent_runs),
            config,
            principal,
            catalog,
            accept_list,
            sequence: SequenceTracker::new(),
            replay,
            flow: None,
            transactions: TransactionRegistry::new(),
            missed_heartbeats: 0,
            last_heartbeat_sent: None,
            awaiting_pong: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process one inbound frame, returning the actions it produces.
    pub fn process_inbound(&mut self, frame: Frame, now: Instant, now_ms: u64) -> Vec<Action> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        let envelope = frame.envelope.clone();
        let exempt_from_seq = matches!(envelope.event_type, EventType::Core(CoreEventType::ReplayRequest));
        match self.sequence.observe_inbound(envelope.seq.get(), exempt_from_seq) {
            Ok(SeqOutcome::Fresh) => {}
            // At-least-once redelivery of an already-processed envelope: a
            // no-op with respect to application state (§8 invariant 7), not
            // a sequence reversal.
            Ok(SeqOutcome::Duplicate) => return Vec::new(),
            Err(err) => return self.fail(err, now, now_ms),
        }

        match decide_acceptance(&envelope, &self.accept_list) {
            AcceptDecision::Ignore => return Vec::new(),
            AcceptDecision::Reject => {
                return self.fail(SessionError::UnsupportedType(envelope.event_type.as_str().to_string()), now, now_ms)
            }
            AcceptDecision::Accept => {}
        }

        if self.state == SessionState::AwaitingHandshake {
            return self.handle_handshake(frame, now, now_ms);
        }

        if !self.is_handshake_or_heartbeat(&envelope.event_type)
            && !self.principal.permits(envelope.event_type.as_str(), envelope.channel)
        {
            return self.fail(
                SessionError::PermissionDenied {
                    event_type: envelope.event_type.as_str().to_string(),
                    channel: envelope.channel.to_string(),
                },
                now,
                now_ms,
            );
        }

        let charged_bytes = envelope.charged_bytes();
        let mut pre_actions = Vec::new();
        if let Some(flow) = self.flow.as_mut() {
            match flow.charge_inbound(envelope.channel, charged_bytes) {
                Ok(Some(grant)) => {
                    let update = self.build_flow_update(grant.channel, grant.messages, grant.bytes, now_ms);
                    if let Some(action) = self.outbound(update, now) {
                        pre_actions.push(action);
                    }
                }
                Ok(None) => {}
                Err(err) => return self.fail(err, now, now_ms),
            }
        }

        let result = match &envelope.event_type {
            EventType::Core(CoreEventType::Ping) => self.handle_ping(&frame, now, now_ms),
            EventType::Core(CoreEventType::Pong) => self.handle_pong(now),
            EventType::Core(CoreEventType::FlowUpdate) => self.handle_flow_update(&frame),
            EventType::Core(CoreEventType::TransactionStart) => self.handle_transaction_start(&frame, now, now_ms),
            EventType::Core(CoreEventType::TransactionEnd) => self.handle_transaction_end(&frame),
            EventType::Core(CoreEventType::MessageStart)
            | EventType::Core(CoreEventType::MessagePart)
            | EventType::Core(CoreEventType::MessageEnd)
            | EventType::Core(CoreEventType::AudioChunk) => self.handle_content(&frame, now),
            EventType::Core(CoreEventType::ReplayRequest) => self.handle_replay_request(&frame),
            EventType::Core(CoreEventType::ToolList) => Ok(self.build_tool_list(now, now_ms)),
            EventType::Core(CoreEventType::ToolSchema) => self.handle_tool_schema(&frame, now, now_ms),
            EventType::Core(CoreEventType::Error) | EventType::Core(CoreEventType::Info) => Ok(Vec::new()),
            EventType::Core(CoreEventType::Hai) => Err(SessionError::InvalidState),
            EventType::Unknown(_) => Ok(Vec::new()),
        };

        match result {
            Ok(actions) => {
                pre_actions.extend(actions);
                pre_actions
            }
            Err(err) => {
                pre_actions.extend(self.fail(err, now, now_ms));
                pre_actions
            }
        }
    }

    /// Periodic tick: drives heartbeat send/timeout. Call at roughly
    /// `heartbeat.interval` cadence.
    pub fn tick(&mut self, now: Instant, now_ms: u64) -> Vec<Action> {
        if self.state != SessionState::Active {
            return Vec::new();
        }
        if self.awaiting_pong {
            let elapsed = self
                .last_heartbeat_sent
                .map(|t| now.duration_since(t))
                .unwrap_or_default();
            if elapsed > self.config.heartbeat.timeout {
                self.missed_heartbeats += 1;
                self.awaiting_pong = false;
                if self.missed_heartbeats >= self.config.heartbeat.max_missed {
                    self.state = SessionState::Closed;
                    return vec![Action::Close {
                        code: ErrorCode::ProtocolViolation,
                        message: "heartbeat timeout".to_string(),
                    }];
                }
            }
            return Vec::new();
        }
        let due = self
            .last_heartbeat_sent
            .map(|t| now.duration_since(t) >= self.config.heartbeat.interval)
            .unwrap_or(true);
        if !due {
            return Vec::new();
        }
        self.last_heartbeat_sent = Some(now);
        self.awaiting_pong = true;
        let ping = self.build_envelope(Channel::System, CoreEventType::Ping.into(), Map::new(), now_ms);
        self.outbound(ping, now).into_iter().collect()
    }

    fn is_handshake_or_heartbeat(&self, event_type: &EventType) -> bool {
        matches!(
            event_type,
            EventType::Core(CoreEventType::Hai) | EventType::Core(CoreEventType::Ping) | EventType::Core(CoreEventType::Pong)
        )
    }

    fn handle_handshake(&mut self, frame: Frame, now: Instant, now_ms: u64) -> Vec<Action> {
        if !matches!(frame.envelope.event_type, EventType::Core(CoreEventType::Hai)) {
            return self.fail(SessionError::InvalidState, now, now_ms);
        }
        let payload = &frame.envelope.payload;
        let accept_major: Vec<u64> = payload
            .get("accept_major")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_else(|| vec![1]);
        let negotiated_major = accept_major
            .iter()
            .copied()
            .find(|m| self.config.supported_majors.contains(&(*m as u8)))
            .map(|m| m as u8);
        let Some(negotiated_major) = negotiated_major else {
            return self.fail(SessionError::VersionIncompatible, now, now_ms);
        };

        let flow_caps = payload.get("capabilities").and_then(|c| c.get("flow_control"));
        let peer_messages = flow_caps
            .and_then(|c| c.get("initial_credit_messages"))
            .and_then(Value::as_u64)
            .unwrap_or(self.config.flow_control.initial_credit_messages);
        let peer_bytes = flow_caps
            .and_then(|c| c.get("initial_credit_bytes"))
            .and_then(Value::as_u64)
            .unwrap_or(self.config.flow_control.initial_credit_bytes);
        let granted_messages = peer_messages.min(self.principal.credit_allowance);
        let flow = FlowController::new(self.config.flow_control.clone(), granted_messages, peer_bytes);
        let granted = flow.outbound_ledger(Channel::User);
        self.flow = Some(flow);
        self.state = SessionState::Active;

        let mut flow_control = Map::new();
        flow_control.insert("initial_credit_messages".to_string(), Value::from(granted.messages));
        flow_control.insert("initial_credit_bytes".to_string(), Value::from(granted.bytes));
        let mut capabilities = Map::new();
        capabilities.insert("flow_control".to_string(), Value::Object(flow_control));

        let mut reply_payload = Map::new();
        reply_payload.insert("haip_version".to_string(), Value::from("1.1.2"));
        reply_payload.insert("accept_major".to_string(), Value::from(vec![Value::from(negotiated_major)]));
        reply_payload.insert(
            "accept_events".to_string(),
            Value::from(self.accept_list.iter().cloned().collect::<Vec<_>>()),
        );
        reply_payload.insert("capabilities".to_string(), Value::Object(capabilities));
        let reply = self.build_envelope(Channel::System, CoreEventType::Hai.into(), reply_payload, now_ms);
        self.outbound(reply, now).into_iter().collect()
    }

    fn handle_ping(&mut self, frame: &Frame, now: Instant, now_ms: u64) -> Result<Vec<Action>, SessionError> {
        let mut payload = Map::new();
        if let Some(echo) = frame.envelope.payload.get("nonce") {
            payload.insert("nonce".to_string(), echo.clone());
        }
        let pong = self.build_envelope(Channel::System, CoreEventType::Pong.into(), payload, now_ms);
        Ok(self.outbound(pong, now).into_iter().collect())
    }

    fn handle_pong(&mut self, now: Instant) -> Result<Vec<Action>, SessionError> {
        self.missed_heartbeats = 0;
        self.awaiting_pong = false;
        if let Some(sent_at) = self.last_heartbeat_sent {
            let rtt = now.duration_since(sent_at);
            if let Some(flow) = self.flow.as_mut() {
                flow.record_rtt(rtt);
            }
        }
        Ok(Vec::new())
    }

    /// Apply a peer-granted `FLOW_UPDATE` and re-transmit whatever now
    /// drains from the backpressure queue. Drained envelopes were already
    /// charged and replay-recorded when first built, so they go straight to
    /// `Transmit` without passing through [`Self::outbound`] again.
    fn handle_flow_update(&mut self, frame: &Frame) -> Result<Vec<Action>, SessionError> {
        let payload = &frame.envelope.payload;
        let messages = decimal_field(payload, "messages")?;
        let bytes = decimal_field(payload, "bytes")?;
        let channel = frame.envelope.channel;
        let drained = self
            .flow
            .as_mut()
            .map(|f| f.apply_peer_flow_update(channel, messages, bytes))
            .unwrap_or_default();
        Ok(drained.into_iter().map(|e| Action::Transmit(Frame::new(e))).collect())
    }

    /// Open a transaction and emit its server-assigned id back to the peer.
    ///
    /// The spec text says the id rides in the confirming envelope's `ack`
    /// slot; since `ack` is reserved on the wire for acknowledging the
    /// peer's highest observed sequence (§3, §6), the id is carried in the
    /// `transaction` field instead — see DESIGN.md.
    fn handle_transaction_start(&mut self, frame: &Frame, now: Instant, now_ms: u64) -> Result<Vec<Action>, SessionError> {
        let payload = &frame.envelope.payload;
        let tool_name = payload
            .get("tool")
            .and_then(Value::as_str)
            .ok_or(SessionError::InvalidState)?
            .to_string();
        if self.catalog.get(&tool_name).is_none() {
            return Err(SessionError::UnknownTool(tool_name));
        }
        let transaction_id = frame
            .envelope
            .transaction
            .clone()
            .unwrap_or_else(|| frame.envelope.id.to_string());

        let run_id = self.runs.start(tool_name.clone())?;
        self.transactions
            .open(transaction_id.clone(), Some(run_id), self.config.replay.clone())?;

        let mut confirm = self.build_envelope(
            frame.envelope.channel,
            CoreEventType::TransactionStart.into(),
            Map::new(),
            now_ms,
        );
        confirm.transaction = Some(transaction_id.clone());
        let mut actions: Vec<Action> = self.outbound(confirm, now).into_iter().collect();

        let input = payload.get("input").cloned().unwrap_or(Value::Null);
        actions.push(Action::InvokeTool {
            run_id,
            transaction_id,
            tool_name,
            input,
        });
        Ok(actions)
    }

    fn handle_transaction_end(&mut self, frame: &Frame) -> Result<Vec<Action>, SessionError> {
        let transaction_id = frame.envelope.transaction.clone().ok_or(SessionError::InvalidState)?;
        let run_id = self.transactions.get(&transaction_id).and_then(|t| t.run_id);
        self.transactions.close(&transaction_id)?;
        if let Some(run_id) = run_id {
            let cancelled = frame
                .envelope
                .payload
                .get("cancelled")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if cancelled {
                self.runs.request_cancel(&run_id)?;
                return Ok(vec![Action::CancelTool { run_id }]);
            }
            self.runs.complete(&run_id)?;
        }
        Ok(Vec::new())
    }

    fn handle_content(&mut self, frame: &Frame, now: Instant) -> Result<Vec<Action>, SessionError> {
        let transaction_id = frame.envelope.transaction.clone().ok_or(SessionError::InvalidState)?;
        let transaction = self
            .transactions
            .get_mut(&transaction_id)
            .ok_or(SessionError::InvalidState)?;
        if !transaction.is_open() {
            return Err(SessionError::InvalidState);
        }
        transaction.record(frame.envelope.seq.get(), frame.envelope.clone(), now);
        let run_id = transaction.run_id.ok_or(SessionError::InvalidState)?;
        Ok(vec![Action::ForwardToTool {
            run_id,
            transaction_id,
            envelope: frame.envelope.clone(),
        }])
    }

    /// Retransmitted envelopes were already charged and recorded on their
    /// original send, so replay never double-charges flow credit.
    fn handle_replay_request(&mut self, frame: &Frame) -> Result<Vec<Action>, SessionError> {
        let payload = &frame.envelope.payload;
        let from = decimal_field(payload, "from_seq")?;
        let to = payload
            .get("to_seq")
            .and_then(Value::as_str)
            .map(DecimalU64::parse)
            .transpose()
            .map_err(|_| SessionError::InvalidState)?
            .map(DecimalU64::get);

        let envelopes = if let Some(transaction_id) = &frame.envelope.transaction {
            let transaction = self.transactions.get(transaction_id).ok_or(SessionError::InvalidState)?;
            transaction.slice(from, to)?
        } else {
            self.replay.slice(from, to)?
        };
        Ok(envelopes.into_iter().map(|e| Action::Transmit(Frame::new(e))).collect())
    }

    fn handle_tool_schema(&mut self, frame: &Frame, now: Instant, now_ms: u64) -> Result<Vec<Action>, SessionError> {
        let name = frame
            .envelope
            .payload
            .get("tool")
            .and_then(Value::as_str)
            .ok_or(SessionError::InvalidState)?;
        let schema = self.catalog.get(name).ok_or_else(|| SessionError::UnknownTool(name.to_string()))?;
        let mut payload = Map::new();
        payload.insert("tool".to_string(), Value::from(schema.name));
        payload.insert("description".to_string(), Value::from(schema.description));
        payload.insert("inputSchema".to_string(), schema.input_schema);
        let envelope = self.build_envelope(Channel::System, CoreEventType::ToolSchema.into(), payload, now_ms);
        Ok(self.outbound(envelope, now).into_iter().collect())
    }

    fn build_tool_list(&mut self, now: Instant, now_ms: u64) -> Vec<Action> {
        let tools: Vec<Value> = self
            .catalog
            .list()
            .into_iter()
            .map(|t| {
                let mut m = Map::new();
                m.insert("name".to_string(), Value::from(t.name));
                m.insert("description".to_string(), Value::from(t.description));
                Value::Object(m)
            })
            .collect();
        let mut payload = Map::new();
        payload.insert("tools".to_string(), Value::Array(tools));
        let envelope = self.build_envelope(Channel::System, CoreEventType::ToolList.into(), payload, now_ms);
        self.outbound(envelope, now).into_iter().collect()
    }

    fn build_flow_update(&mut self, channel: Channel, messages: u64, bytes: u64, now_ms: u64) -> Envelope {
        let mut payload = Map::new();
        payload.insert("messages".to_string(), Value::from(DecimalU64::new(messages).to_string()));
        payload.insert("bytes".to_string(), Value::from(DecimalU64::new(bytes).to_string()));
        self.build_envelope(channel, CoreEventType::FlowUpdate.into(), payload, now_ms)
    }

    /// Build an outbound envelope with this session's next sequence number.
    fn build_envelope(&mut self, channel: Channel, event_type: EventType, payload: Map<String, Value>, now_ms: u64) -> Envelope {
        Envelope {
            id: Uuid::new_v4(),
            session: self.session_id.clone(),
            transaction: None,
            seq: DecimalU64::new(self.sequence.assign_outbound()),
            ack: self.sequence.inbound_last().map(DecimalU64::new),
            ts: DecimalU64::new(now_ms),
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

    /// Record a freshly-built envelope in the replay window and charge
    /// outbound flow credit. Returns `None` if the channel has no credit
    /// left — the envelope is queued inside the flow controller and will be
    /// drained (and transmitted) once the peer sends a `FLOW_UPDATE`.
    fn outbound(&mut self, envelope: Envelope, now: Instant) -> Option<Action> {
        self.replay.record(envelope.seq.get(), envelope.clone(), now);
        let charged_bytes = envelope.charged_bytes();
        let can_send = self
            .flow
            .as_mut()
            .map(|f| f.try_charge_outbound(envelope.channel, charged_bytes))
            .unwrap_or(true);
        if can_send {
            Some(Action::Transmit(Frame::new(envelope)))
        } else {
            if let Some(flow) = self.flow.as_mut() {
                flow.enqueue(envelope.channel, envelope);
            }
            None
        }
    }

    /// Take an envelope a tool handler built via its `ToolContext` and run
    /// it through the same seq/replay/flow-control path as any other
    /// outbound envelope, stamping the session's own id/seq/ack/ts over the
    /// handler's placeholder values (§9 arena design note: tools never
    /// touch the session directly, so this is their only way onto the wire).
    pub fn emit_agent_envelope(&mut self, mut envelope: Envelope, now: Instant, now_ms: u64) -> Vec<Action> {
        if self.state != SessionState::Active {
            return Vec::new();
        }
        envelope.id = Uuid::new_v4();
        envelope.session = self.session_id.clone();
        envelope.seq = DecimalU64::new(self.sequence.assign_outbound());
        envelope.ack = self.sequence.inbound_last().map(DecimalU64::new);
        envelope.ts = DecimalU64::new(now_ms);
        self.outbound(envelope, now).into_iter().collect()
    }

    fn fail(&mut self, err: SessionError, now: Instant, now_ms: u64) -> Vec<Action> {
        let code = err.error_code();
        let mut payload = Map::new();
        payload.insert("code".to_string(), Value::from(code.as_str()));
        payload.insert("message".to_string(), Value::from(err.to_string()));
        let envelope = self.build_envelope(Channel::System, CoreEventType::Error.into(), payload, now_ms);
        let mut actions: Vec<Action> = self.outbound(envelope, now).into_iter().collect();
        if err.is_fatal() {
            self.state = SessionState::Closed;
            actions.push(Action::Close {
                code,
                message: err.to_string(),
            });
        }
        actions
    }
}

fn decimal_field(payload: &Map<String, Value>, field: &'static str) -> Result<u64, SessionError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DecimalU64::parse(s).ok())
        .map(DecimalU64::get)
        .ok_or(SessionError::InvalidState)
}
