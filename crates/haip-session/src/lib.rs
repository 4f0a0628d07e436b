//! The session engine (C2-C6): sequencing, replay, flow control,
//! transaction/run lifecycle, and the protocol state machine itself.
//!
//! Deliberately synchronous and I/O-free so it can be driven from any
//! transport and tested without a runtime. `haip-server` owns the async
//! plumbing; `haip-tools` implements [`ToolCatalog`] over its registry.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod replay;
pub mod run;
pub mod sequence;
pub mod transaction;

pub use catalog::{EmptyCatalog, ToolCatalog, ToolSchema};
pub use config::{EngineConfig, FlowControlConfig, HeartbeatConfig, ReplayConfig};
pub use engine::{Action, SessionEngine, SessionState};
pub use error::SessionError;
pub use flow::{FlowController, FlowGrant, Ledger};
pub use replay::ReplayWindow;
pub use run::{Run, RunRegistry, RunState};
pub use sequence::{SeqOutcome, SequenceTracker};
pub use transaction::{Transaction, TransactionRegistry, TransactionState};
