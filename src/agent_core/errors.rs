//! Agent Core error types.

use thiserror::Error;

use crate::mcp_client::McpError;

/// Why a tool call could not produce a result.
///
/// The dispatcher never returns these to its caller; they are rendered into
/// the `Error calling tool <tool>: ...` text shown as the turn's answer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No session is registered under the requested server name.
    #[error("unknown server '{server}'")]
    UnknownServer { server: String },

    /// The server's catalog does not list the tool.
    #[error("server '{server}' has no tool named '{tool}'")]
    UnknownTool { server: String, tool: String },

    /// Required arguments from the tool's input schema are absent.
    #[error("missing required argument(s): {}", missing.join(", "))]
    InvalidArguments { missing: Vec<String> },

    /// The remote call failed in transport or returned a JSON-RPC error.
    #[error("{0}")]
    Transport(#[from] McpError),

    /// The tool ran and reported its own failure (`isError: true`).
    #[error("tool reported an error: {text}")]
    ToolFailed { text: String },
}
