//! Server process lifecycle management.
//!
//! Handles spawning MCP server child processes, the initialization
//! handshake, catalog discovery, and shutdown. Each server runs as a
//! separate OS process communicating via JSON-RPC over stdio.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use super::errors::McpError;
use super::session::{LaunchedSession, SessionLauncher, ToolSession};
use super::transport::{extract_result, StdioTransport};
use super::types::ServerConfig;
use crate::protocol::{
    CallToolResult, InitializeResult, ListToolsResult, ToolDescriptor, PROTOCOL_VERSION,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Timeout for graceful shutdown before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on `tools/list` pages, guarding against a server that
/// keeps returning a cursor.
const MAX_TOOL_PAGES: usize = 64;

// ─── ManagedServer ───────────────────────────────────────────────────────────

/// A running MCP server process with its transport.
pub struct ManagedServer {
    /// Logical server name (e.g., "weather").
    pub name: String,
    /// The child process handle. Spawned with `kill_on_drop`.
    process: Child,
    /// JSON-RPC transport (stdin/stdout).
    pub transport: StdioTransport,
}

impl ManagedServer {
    /// Attempt to gracefully shut down the server.
    ///
    /// Sends a best-effort `shutdown` notification, closes stdin, waits up to
    /// [`SHUTDOWN_TIMEOUT`], then kills the process.
    pub async fn shutdown(&mut self) {
        let _ = self.transport.notify("shutdown", None).await;
        self.transport.close_stdin().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.process.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(server = %self.name, %status, "server exited");
            }
            _ => {
                tracing::warn!(server = %self.name, "server did not exit in time, killing");
                let _ = self.process.kill().await;
            }
        }
    }
}

#[async_trait]
impl ToolSession for ManagedServer {
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let response = self.transport.request("tools/call", Some(params)).await?;
        let result = extract_result(response)?;

        serde_json::from_value(result).map_err(|e| McpError::TransportError {
            server: self.name.clone(),
            reason: format!("malformed tools/call result: {e}"),
        })
    }

    async fn close(&mut self) {
        self.shutdown().await;
    }
}

// ─── Spawning ────────────────────────────────────────────────────────────────

/// Spawn a single MCP server process, perform the initialization handshake,
/// and fetch its tool catalog.
pub async fn spawn_server(
    config: &ServerConfig,
) -> Result<(ManagedServer, Vec<ToolDescriptor>), McpError> {
    let name = config.name.as_str();
    let launch = config.launch_command()?;

    let mut cmd = Command::new(&launch.program);
    cmd.args(&launch.args);

    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    if let Some(dir) = config.cwd.as_deref() {
        cmd.current_dir(dir);
    }

    // Windows: prevent console window from appearing for child processes
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
        name: name.to_string(),
        reason: format!("{} {}: {e}", launch.program, launch.args.join(" ")),
    })?;

    let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdin".into(),
    })?;

    let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
        name: name.to_string(),
        reason: "failed to capture stdout".into(),
    })?;

    if let Some(stderr) = child.stderr.take() {
        forward_stderr(name.to_string(), stderr);
    }

    let server = ManagedServer {
        name: name.to_string(),
        process: child,
        transport: StdioTransport::new(name, stdin, stdout),
    };

    let tools = match handshake(&server.transport, name).await {
        Ok(tools) => tools,
        Err(e) => {
            // `server` is dropped here; kill_on_drop reaps the child.
            return Err(McpError::InitFailed {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }
    };

    tracing::info!(
        server = name,
        tool_count = tools.len(),
        tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "connected to MCP server"
    );

    Ok((server, tools))
}

/// Drain a child's stderr into the log so the pipe never fills up.
fn forward_stderr(server: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server, "stderr: {line}");
        }
    });
}

/// `initialize` → `notifications/initialized` → paged `tools/list`.
pub async fn handshake(
    transport: &StdioTransport,
    server_name: &str,
) -> Result<Vec<ToolDescriptor>, McpError> {
    let params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    });

    let response = transport.request("initialize", Some(params)).await?;
    let result = extract_result(response)?;
    let init: InitializeResult =
        serde_json::from_value(result).map_err(|e| McpError::InitFailed {
            name: server_name.to_string(),
            reason: format!("failed to parse initialize response: {e}"),
        })?;

    tracing::debug!(
        server = server_name,
        protocol_version = %init.protocol_version,
        server_info = ?init.server_info,
        "initialize complete"
    );

    transport.notify("notifications/initialized", None).await?;

    list_tools(transport, server_name).await
}

/// Fetch the full tool catalog, following `nextCursor` pagination.
async fn list_tools(
    transport: &StdioTransport,
    server_name: &str,
) -> Result<Vec<ToolDescriptor>, McpError> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_TOOL_PAGES {
        let params = cursor
            .as_ref()
            .map(|c| serde_json::json!({ "cursor": c }));
        let response = transport.request("tools/list", params).await?;
        let result = extract_result(response)?;
        let page: ListToolsResult =
            serde_json::from_value(result).map_err(|e| McpError::InitFailed {
                name: server_name.to_string(),
                reason: format!("failed to parse tools/list response: {e}"),
            })?;

        tools.extend(page.tools);
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(tools),
        }
    }

    Err(McpError::InitFailed {
        name: server_name.to_string(),
        reason: format!("tools/list did not finish within {MAX_TOOL_PAGES} pages"),
    })
}

// ─── Launcher ────────────────────────────────────────────────────────────────

/// Launches servers as child processes speaking MCP over stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioLauncher;

#[async_trait]
impl SessionLauncher for StdioLauncher {
    async fn launch(&self, config: &ServerConfig) -> Result<LaunchedSession, McpError> {
        let (server, tools) = spawn_server(config).await?;
        Ok(LaunchedSession {
            tools,
            session: Box::new(server),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
