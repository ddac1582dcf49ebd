//! Minimal MCP server over newline-delimited JSON-RPC.
//!
//! Answers `initialize`, `ping`, `tools/list` and `tools/call`, delegating
//! the tools themselves to a [`ToolHandler`]. Notifications never get a
//! reply. A `shutdown` notification or end of input stops the loop.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::errors::ToolError;
use crate::protocol::{
    error_codes, CallToolResult, IncomingMessage, InitializeResult, ListToolsResult,
    OutgoingResponse, ServerInfo, ToolDescriptor, PROTOCOL_VERSION,
};

// ─── ToolHandler ─────────────────────────────────────────────────────────────

/// The tools a server exposes.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Catalog returned by `tools/list`.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Run one tool.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ToolError>;
}

// ─── Message handling ────────────────────────────────────────────────────────

/// What the serve loop should do after one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// Write this line back.
    Respond(String),
    /// Nothing to write (notification or blank line).
    Silent,
    /// Stop serving.
    Shutdown,
}

/// Serves a [`ToolHandler`] over JSON-RPC.
pub struct McpServer<H> {
    handler: H,
    name: String,
    version: String,
}

impl<H: ToolHandler> McpServer<H> {
    pub fn new(name: impl Into<String>, version: impl Into<String>, handler: H) -> Self {
        Self {
            handler,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Handle one raw input line.
    pub async fn handle_line(&self, line: &str) -> Handled {
        let line = line.trim();
        if line.is_empty() {
            return Handled::Silent;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable message");
                return respond(OutgoingResponse::failure(
                    Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        let id = value.get("id").cloned().filter(|id| !id.is_null());
        let message: IncomingMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                return match id {
                    Some(id) => respond(OutgoingResponse::failure(
                        id,
                        error_codes::INVALID_REQUEST,
                        format!("Invalid request: {e}"),
                    )),
                    None => Handled::Silent,
                };
            }
        };

        let Some(id) = id else {
            return self.handle_notification(&message.method);
        };

        tracing::debug!(method = %message.method, "request");
        let response = match self.handle_request(&message.method, message.params).await {
            Ok(result) => OutgoingResponse::success(id, result),
            Err((code, text)) => OutgoingResponse::failure(id, code, text),
        };
        respond(response)
    }

    fn handle_notification(&self, method: &str) -> Handled {
        match method {
            "shutdown" | "exit" => {
                tracing::info!(method, "shutdown requested");
                Handled::Shutdown
            }
            _ => {
                tracing::debug!(method, "notification");
                Handled::Silent
            }
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, (i32, String)> {
        match method {
            "initialize" => to_value(&InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({ "tools": {} }),
                server_info: Some(ServerInfo {
                    name: Some(self.name.clone()),
                    version: Some(self.version.clone()),
                }),
            }),
            "ping" => Ok(json!({})),
            "tools/list" => to_value(&ListToolsResult {
                tools: self.handler.tools(),
                next_cursor: None,
            }),
            "tools/call" => self.call_tool(params).await,
            other => Err((
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i32, String)> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                (
                    error_codes::INVALID_PARAMS,
                    "tools/call requires a string 'name'".to_string(),
                )
            })?;
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let result = match self.handler.call_tool(name, arguments).await {
            Ok(result) => result,
            Err(e) => match e.rpc_code() {
                Some(code) => return Err((code, e.to_string())),
                None => {
                    tracing::warn!(tool = name, error = %e, "tool failed");
                    CallToolResult {
                        is_error: true,
                        ..CallToolResult::text(e.to_string())
                    }
                }
            },
        };
        to_value(&result)
    }

    // ─── Serve loop ──────────────────────────────────────────────────────

    /// Read requests from `reader` and write responses to `writer` until
    /// end of input or a shutdown notification.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(server = %self.name, version = %self.version, "serving");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            match self.handle_line(&line).await {
                Handled::Respond(mut out) => {
                    out.push('\n');
                    writer.write_all(out.as_bytes()).await?;
                    writer.flush().await?;
                }
                Handled::Silent => {}
                Handled::Shutdown => break,
            }
        }

        tracing::info!(server = %self.name, "serve loop finished");
        Ok(())
    }

    /// Serve on the process's stdin/stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

fn respond(response: OutgoingResponse) -> Handled {
    match serde_json::to_string(&response) {
        Ok(line) => Handled::Respond(line),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            Handled::Silent
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, (i32, String)> {
    serde_json::to_value(value).map_err(|e| (error_codes::INTERNAL_ERROR, e.to_string()))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
