//! MCP Client — JSON-RPC over stdio transport for tool server sessions.
//!
//! This module handles:
//! - Spawning MCP server child processes and the initialization handshake
//! - JSON-RPC 2.0 communication over process stdio
//! - Tool catalog discovery (`tools/list`, paginated)
//! - The session registry that owns every live connection
//! - Graceful shutdown in reverse acquisition order

pub mod errors;
pub mod lifecycle;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use errors::McpError;
pub use lifecycle::{ManagedServer, StdioLauncher};
pub use registry::{RegisteredSession, SessionRegistry};
pub use session::{LaunchedSession, SessionLauncher, ToolSession};
pub use types::{LaunchCommand, ServerConfig};
