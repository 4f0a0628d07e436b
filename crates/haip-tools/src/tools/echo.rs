//! Reference tool: echoes the `text` field of its input back on the AGENT
//! channel. Used in the handshake-to-content walkthrough (spec §8(e)).

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use haip_session::ToolSchema;
use haip_wire::CoreEventType;

use crate::{context::ToolContext, error::ToolError, handler::ToolHandler};

pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".to_string(),
            description: "Echoes the input text back on the agent channel.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            }),
        }
    }

    async fn start(&self, ctx: &ToolContext, input: Value) -> Result<(), ToolError> {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut payload = Map::new();
        payload.insert("text".to_string(), Value::String(text));
        ctx.emit(CoreEventType::MessageStart.into(), payload);
        Ok(())
    }
}
