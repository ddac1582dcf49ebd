//! MCP server error types.

use thiserror::Error;

use crate::protocol::error_codes;

/// Errors a tool handler reports back to the serve loop.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not served here.
    #[error("unknown tool: '{name}'")]
    UnknownTool { name: String },

    /// Arguments do not match the tool's input schema.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool ran and failed.
    #[error("tool '{tool}' failed: {reason}")]
    Failed { tool: String, reason: String },
}

impl ToolError {
    /// JSON-RPC error code for protocol-level failures, `None` when the
    /// failure belongs in a tool result with `isError: true`.
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            ToolError::UnknownTool { .. } | ToolError::InvalidArguments { .. } => {
                Some(error_codes::INVALID_PARAMS)
            }
            ToolError::Failed { .. } => None,
        }
    }
}
