//! The tool handler contract (§4.5).

use async_trait::async_trait;
use haip_wire::{BinaryFrame, Envelope};
use haip_session::ToolSchema;

use crate::{context::ToolContext, error::ToolError};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Invoked once when `TRANSACTION_START` names this tool.
    async fn start(&self, ctx: &ToolContext, input: serde_json::Value) -> Result<(), ToolError>;

    /// Invoked for every `MESSAGE_START`/`MESSAGE_PART`/`MESSAGE_END` on the
    /// open transaction bound to this tool.
    async fn handle_message(&self, ctx: &ToolContext, envelope: &Envelope) -> Result<(), ToolError> {
        let _ = (ctx, envelope);
        Ok(())
    }

    /// Invoked for `AUDIO_CHUNK` envelopes on the same transaction.
    async fn handle_audio_chunk(&self, ctx: &ToolContext, envelope: &Envelope, binary: Option<BinaryFrame>) -> Result<(), ToolError> {
        let _ = (ctx, envelope, binary);
        Ok(())
    }

    /// Cooperative cancellation: called once when the peer cancels the run.
    /// Default is a no-op; long-running handlers should override this to
    /// release resources promptly.
    async fn cancel(&self, ctx: &ToolContext) {
        let _ = ctx;
    }
}
