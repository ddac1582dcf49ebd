//! MCP client error types.

use thiserror::Error;

/// Errors that can occur while launching, talking to, or looking up MCP servers.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    /// The initialization handshake or catalog fetch failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed { name: String, reason: String },

    /// JSON-RPC communication error (malformed message, I/O error, closed pipe).
    #[error("transport error for server '{server}': {reason}")]
    TransportError { server: String, reason: String },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// No session is registered under this name.
    #[error("unknown server: '{name}'")]
    ServerNotFound { name: String },

    /// A second session was registered under an existing name.
    #[error("server '{name}' is already registered")]
    DuplicateServer { name: String },

    /// Server configuration cannot be turned into a launch command.
    #[error("config error for server '{name}': {reason}")]
    ConfigError { name: String, reason: String },
}
