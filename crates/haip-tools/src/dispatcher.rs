//! Async dispatch of tool invocations onto their own tasks (§4.5, §5).
//!
//! One task per run, grounded on the teacher's `ApprovalManager` pattern of
//! a `DashMap` of pending work paired with a `oneshot` cancellation signal.
//! The dispatcher never touches the session: it only receives a
//! [`ToolContext`] (session id, transaction id, a send callback) up front.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use haip_wire::Envelope;

use crate::{context::ToolContext, error::ToolError, handler::ToolHandler, registry::ToolRegistry};

struct RunHandle {
    cancel_tx: oneshot::Sender<()>,
    content_tx: mpsc::UnboundedSender<Envelope>,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: ToolRegistry,
    active: Arc<DashMap<Uuid, RunHandle>>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Start executing `tool_name` for `run_id` on its own task.
    pub fn invoke(&self, tool_name: &str, ctx: ToolContext, input: serde_json::Value) -> Result<(), ToolError> {
        let handler = self
            .registry
            .handler(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (content_tx, content_rx) = mpsc::unbounded_channel();
        let run_id = ctx.run_id;
        self.active.insert(run_id, RunHandle { cancel_tx, content_tx });
        let active = self.active.clone();
        tokio::spawn(async move {
            drive(handler, ctx, input, content_rx, cancel_rx).await;
            active.remove(&run_id);
        });
        Ok(())
    }

    /// Forward a message/audio-chunk envelope to the task already running
    /// for this run. A run that has already finished silently drops it.
    pub fn forward(&self, run_id: Uuid, envelope: Envelope) {
        if let Some(handle) = self.active.get(&run_id) {
            let _ = handle.content_tx.send(envelope);
        }
    }

    /// Request cooperative cancellation; idempotent on an already-finished
    /// or already-cancelled run.
    pub fn cancel(&self, run_id: Uuid) {
        if let Some((_, handle)) = self.active.remove(&run_id) {
            let _ = handle.cancel_tx.send(());
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

async fn drive(
    handler: Arc<dyn ToolHandler>,
    ctx: ToolContext,
    input: serde_json::Value,
    mut content_rx: mpsc::UnboundedReceiver<Envelope>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        biased;
        _ = &mut cancel_rx => {
            handler.cancel(&ctx).await;
            return;
        }
        result = handler.start(&ctx, input) => {
            if let Err(err) = result {
                warn!(transaction = %ctx.transaction_id, error = %err, "tool start failed");
                return;
            }
        }
    }

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                handler.cancel(&ctx).await;
                break;
            }
            maybe_envelope = content_rx.recv() => {
                match maybe_envelope {
                    Some(envelope) => {
                        if let Err(err) = handler.handle_message(&ctx, &envelope).await {
                            warn!(transaction = %ctx.transaction_id, error = %err, "tool message handling failed");
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::echo::EchoTool;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn echo_invocation_emits_on_agent_channel() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let dispatcher = Dispatcher::new(registry);

        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let send: crate::context::SendFn = Arc::new(move |envelope| sent_clone.lock().unwrap().push(envelope));
        let ctx = ToolContext::new("s1".to_string(), "t1".to_string(), Uuid::new_v4(), send);

        dispatcher.invoke("echo", ctx, serde_json::json!({"text": "hi"})).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let emitted = sent.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].payload["text"], serde_json::Value::from("hi"));
    }

    #[tokio::test]
    async fn cancelling_an_unknown_run_is_a_noop() {
        let dispatcher = Dispatcher::new(ToolRegistry::new());
        dispatcher.cancel(Uuid::new_v4());
        assert_eq!(dispatcher.active_count(), 0);
    }
}
