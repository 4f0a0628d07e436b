//! End-to-end scenario coverage (§8): drives a handshake, a tool
//! invocation, and teardown through `session_actor::run_session` over a
//! `MemoryTransport` loopback, exercising the full wire path without a real
//! network transport.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use uuid::Uuid;

use haip_auth::{ChannelGrant, Principal};
use haip_server::registry::SessionRegistry;
use haip_server::session_actor::{run_session, SessionParams};
use haip_session::EngineConfig;
use haip_tools::{Dispatcher, EchoTool, ToolRegistry};
use haip_transport::{MemoryTransport, Transport};
use haip_wire::{Channel, CoreEventType, DecimalU64, Envelope, EventType, Frame};

fn full_principal() -> Principal {
    CoreEventType::ALL
        .iter()
        .fold(Principal::new("u1", 1_000), |p, t| p.with_permission(t.as_str(), ChannelGrant::Wildcard))
}

fn hai_frame() -> Frame {
    let mut payload = Map::new();
    payload.insert("accept_major".to_string(), Value::from(vec![Value::from(1)]));
    Frame::new(Envelope {
        id: Uuid::new_v4(),
        session: "placeholder".to_string(),
        transaction: None,
        seq: DecimalU64::new(1),
        ack: None,
        ts: DecimalU64::new(0),
        channel: Channel::System,
        event_type: EventType::Core(CoreEventType::Hai),
        payload,
        pv: None,
        crit: None,
        bin_len: None,
        bin_mime: None,
        run_id: None,
        thread_id: None,
        related_id: None,
    })
}

fn transaction_start_frame(seq: u64, tool: &str, input: Value) -> Frame {
    let mut payload = Map::new();
    payload.insert("tool".to_string(), Value::from(tool));
    payload.insert("input".to_string(), input);
    Frame::new(Envelope {
        id: Uuid::new_v4(),
        session: "placeholder".to_string(),
        transaction: Some("t1".to_string()),
        seq: DecimalU64::new(seq),
        ack: None,
        ts: DecimalU64::new(0),
        channel: Channel::User,
        event_type: EventType::Core(CoreEventType::TransactionStart),
        payload,
        pv: None,
        crit: None,
        bin_len: None,
        bin_mime: None,
        run_id: None,
        thread_id: None,
        related_id: None,
    })
}

async fn recv_with_timeout(transport: &Arc<MemoryTransport>) -> Frame {
    tokio::time::timeout(Duration::from_secs(1), transport.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("transport closed unexpectedly")
}

#[tokio::test]
async fn handshake_transaction_and_tool_echo_round_trip() {
    let (client, server) = MemoryTransport::pair();
    let server_transport: Arc<dyn Transport> = server;

    let tool_registry = ToolRegistry::new();
    tool_registry.register(Arc::new(EchoTool));
    let dispatcher = Arc::new(Dispatcher::new(tool_registry.clone()));
    let registry = SessionRegistry::new();
    let (_close_tx, close_rx) = oneshot::channel::<()>();

    let params = SessionParams {
        session_id: "s1".to_string(),
        config: EngineConfig::default(),
        principal: full_principal(),
        catalog: Arc::new(tool_registry),
        transport: server_transport,
        dispatcher,
        registry,
    };
    let session_task = tokio::spawn(run_session(params, close_rx));

    client.send(hai_frame()).await.unwrap();
    let hai_reply = recv_with_timeout(&client).await;
    assert_eq!(hai_reply.envelope.event_type, EventType::Core(CoreEventType::Hai));

    client
        .send(transaction_start_frame(2, "echo", serde_json::json!({"text": "hi"})))
        .await
        .unwrap();

    let confirm = recv_with_timeout(&client).await;
    assert_eq!(confirm.envelope.event_type, EventType::Core(CoreEventType::TransactionStart));
    assert_eq!(confirm.envelope.transaction.as_deref(), Some("t1"));

    let echoed = recv_with_timeout(&client).await;
    assert_eq!(echoed.envelope.event_type, EventType::Core(CoreEventType::MessageStart));
    assert_eq!(echoed.envelope.channel, Channel::Agent);
    assert_eq!(echoed.envelope.payload["text"], Value::from("hi"));

    client.close();
    session_task.abort();
}

#[tokio::test]
async fn unknown_tool_closes_the_session() {
    let (client, server) = MemoryTransport::pair();
    let server_transport: Arc<dyn Transport> = server;

    let tool_registry = ToolRegistry::new();
    let dispatcher = Arc::new(Dispatcher::new(tool_registry.clone()));
    let registry = SessionRegistry::new();
    let (_close_tx, close_rx) = oneshot::channel::<()>();

    let params = SessionParams {
        session_id: "s1".to_string(),
        config: EngineConfig::default(),
        principal: full_principal(),
        catalog: Arc::new(tool_registry),
        transport: server_transport,
        dispatcher,
        registry,
    };
    let session_task = tokio::spawn(run_session(params, close_rx));

    client.send(hai_frame()).await.unwrap();
    let _ = recv_with_timeout(&client).await;

    client
        .send(transaction_start_frame(2, "does-not-exist", Value::Null))
        .await
        .unwrap();

    let error_frame = recv_with_timeout(&client).await;
    assert_eq!(error_frame.envelope.event_type, EventType::Core(CoreEventType::Error));

    tokio::time::timeout(Duration::from_secs(1), session_task)
        .await
        .expect("session task did not finish after a fatal error")
        .unwrap();
}
