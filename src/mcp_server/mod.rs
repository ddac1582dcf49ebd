//! MCP Server — the serving side of the stdio protocol.
//!
//! Used by the `weather-server` binary; any [`ToolHandler`] can be served.

pub mod errors;
pub mod server;

pub use errors::ToolError;
pub use server::{Handled, McpServer, ToolHandler};
