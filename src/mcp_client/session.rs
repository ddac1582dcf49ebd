//! Session seams: what the registry and dispatcher need from a live server.

use async_trait::async_trait;

use super::errors::McpError;
use super::types::ServerConfig;
use crate::protocol::{CallToolResult, ToolDescriptor};

/// A live connection to one tool-providing server.
///
/// Dropping a session releases its transport; `close` gives the server a
/// chance to exit gracefully first.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Invoke `tools/call` on the server.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError>;

    /// Graceful shutdown. Called at most once, right before the session is dropped.
    async fn close(&mut self);
}

/// A freshly opened session together with the catalog fetched during the handshake.
pub struct LaunchedSession {
    pub tools: Vec<ToolDescriptor>,
    pub session: Box<dyn ToolSession>,
}

/// Opens sessions for configured servers.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, config: &ServerConfig) -> Result<LaunchedSession, McpError>;
}
