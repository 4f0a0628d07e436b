//! Reference tool demonstrating cooperative cancellation (spec §8(f)).
//!
//! `start` just sleeps; the dispatcher's outer `tokio::select!` races that
//! sleep against the run's cancellation signal, so cancelling mid-sleep
//! drops the sleep future without this tool doing anything special. The
//! only thing the tool itself needs to do is report how the run ended.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::time::sleep;

use haip_session::ToolSchema;
use haip_wire::CoreEventType;

use crate::{context::ToolContext, error::ToolError, handler::ToolHandler};

const DEFAULT_DURATION_MS: u64 = 1000;
const MAX_DURATION_MS: u64 = 60_000;

pub struct SleepTool;

#[async_trait]
impl ToolHandler for SleepTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "sleep".to_string(),
            description: "Sleeps for the requested duration, then reports completion.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "duration_ms": { "type": "integer", "minimum": 0, "maximum": MAX_DURATION_MS } },
            }),
        }
    }

    async fn start(&self, ctx: &ToolContext, input: Value) -> Result<(), ToolError> {
        let duration_ms = input
            .get("duration_ms")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_DURATION_MS)
            .min(MAX_DURATION_MS);
        sleep(Duration::from_millis(duration_ms)).await;
        ctx.emit(CoreEventType::MessageEnd.into(), status_payload("completed"));
        Ok(())
    }

    async fn cancel(&self, ctx: &ToolContext) {
        ctx.emit(CoreEventType::MessageEnd.into(), status_payload("cancelled"));
    }
}

fn status_payload(status: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("status".to_string(), Value::String(status.to_string()));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn ctx_with_sink() -> (ToolContext, Arc<Mutex<Vec<haip_wire::Envelope>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let send: crate::context::SendFn = Arc::new(move |e| sent_clone.lock().unwrap().push(e));
        (ToolContext::new("s1".to_string(), "t1".to_string(), Uuid::new_v4(), send), sent)
    }

    #[tokio::test]
    async fn start_reports_completion_after_sleeping() {
        let (ctx, sent) = ctx_with_sink();
        SleepTool.start(&ctx, json!({"duration_ms": 1})).await.unwrap();
        let emitted = sent.lock().unwrap();
        assert_eq!(emitted[0].payload["status"], Value::from("completed"));
    }

    #[tokio::test]
    async fn cancel_reports_cancelled_status() {
        let (ctx, sent) = ctx_with_sink();
        SleepTool.cancel(&ctx).await;
        let emitted = sent.lock().unwrap();
        assert_eq!(emitted[0].payload["status"], Value::from("cancelled"));
    }
}
