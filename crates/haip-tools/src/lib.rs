pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod registry;
pub mod tools;

pub use context::{SendFn, ToolContext};
pub use dispatcher::Dispatcher;
pub use error::ToolError;
pub use handler::ToolHandler;
pub use registry::ToolRegistry;
pub use tools::{EchoTool, SleepTool};
