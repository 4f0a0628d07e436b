//! Reference HAIP server: binds the protocol state machine in `haip-session`
//! and the tool runtime in `haip-tools` to real network transports.

pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod session_actor;

pub use config::ServerConfig;
pub use error::ServerError;
pub use http::{router, AppState};
pub use registry::{ServerStats, SessionRegistry, SessionSummary};
