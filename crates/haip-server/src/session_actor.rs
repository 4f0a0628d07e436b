//! The per-session task (§5): handles inbound frames, tool-originated
//! envelopes, and heartbeat ticks serially through one `SessionEngine`,
//! then hands every resulting [`Action`] off to the transport or the tool
//! dispatcher. This is the single writer the replay window, flow ledger,
//! and transaction/run maps are scoped to.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use haip_auth::Principal;
use haip_session::{Action, EngineConfig, SessionEngine, SessionState, ToolCatalog};
use haip_tools::{Dispatcher, ToolContext};
use haip_transport::Transport;
use haip_wire::Envelope;

use crate::registry::SessionRegistry;

pub struct SessionParams {
    pub session_id: String,
    pub config: EngineConfig,
    pub principal: Principal,
    pub catalog: Arc<dyn ToolCatalog>,
    pub transport: Arc<dyn Transport>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: SessionRegistry,
}

/// Drive one session to completion: runs until the transport closes, the
/// engine closes the session, or an administrator calls `close_session`.
pub async fn run_session(params: SessionParams, mut close_rx: oneshot::Receiver<()>) {
    let SessionParams {
        session_id,
        config,
        principal,
        catalog,
        transport,
        dispatcher,
        registry,
    } = params;

    let heartbeat_interval = config.heartbeat.interval;
    let mut engine = SessionEngine::new(session_id.clone(), config, principal, catalog);

    let (agent_tx, mut agent_rx) = mpsc::unbounded_channel::<Envelope>();
    let send_fn: haip_tools::SendFn = {
        let agent_tx = agent_tx.clone();
        Arc::new(move |envelope| {
            let _ = agent_tx.send(envelope);
        })
    };

    let mut heartbeat_timer = tokio::time::interval(heartbeat_interval);
    heartbeat_timer.tick().await; // first tick fires immediately; skip it

    loop {
        let actions = tokio::select! {
            biased;
            _ = &mut close_rx => {
                info!(session = %session_id, "session closed by administrator");
                break;
            }
            frame = transport.recv() => {
                match frame {
                    Ok(frame) => engine.process_inbound(frame, Instant::now(), wall_clock_ms()),
                    Err(err) => {
                        debug!(session = %session_id, error = %err, "transport disconnected");
                        break;
                    }
                }
            }
            Some(envelope) = agent_rx.recv() => {
                engine.emit_agent_envelope(envelope, Instant::now(), wall_clock_ms())
            }
            _ = heartbeat_timer.tick() => {
                engine.tick(Instant::now(), wall_clock_ms())
            }
        };

        let should_stop = act_on(actions, &session_id, &transport, &dispatcher, &send_fn, &registry).await;
        if should_stop || engine.state() == SessionState::Closed {
            break;
        }
    }

    transport.close();
    registry.unregister(&session_id);
}

/// Apply every action the engine produced; returns `true` if the caller
/// should stop driving the session (a fatal close was among them).
async fn act_on(
    actions: Vec<Action>,
    session_id: &str,
    transport: &Arc<dyn Transport>,
    dispatcher: &Arc<Dispatcher>,
    send_fn: &haip_tools::SendFn,
    registry: &SessionRegistry,
) -> bool {
    let mut stop = false;
    for action in actions {
        match action {
            Action::Transmit(frame) => {
                if let Err(err) = transport.send(frame).await {
                    warn!(session = %session_id, error = %err, "failed to send frame");
                    registry.record_warning();
                    stop = true;
                }
            }
            Action::Close { code, message } => {
                warn!(session = %session_id, %code, %message, "session closing");
                registry.record_error();
                stop = true;
            }
            Action::InvokeTool {
                run_id,
                transaction_id,
                tool_name,
                input,
            } => {
                let ctx = ToolContext::new(session_id.to_string(), transaction_id, run_id, send_fn.clone());
                if let Err(err) = dispatcher.invoke(&tool_name, ctx, input) {
                    warn!(session = %session_id, tool = %tool_name, error = %err, "tool invocation failed");
                    registry.record_warning();
                }
            }
            Action::ForwardToTool { run_id, envelope, .. } => {
                dispatcher.forward(run_id, envelope);
            }
            Action::CancelTool { run_id } => {
                dispatcher.cancel(run_id);
            }
        }
    }
    stop
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
