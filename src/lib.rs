//! Terminal chat client that lets a language model call tools on MCP servers.
//!
//! The client launches each configured server as a child process speaking
//! JSON-RPC over stdio, advertises their tools in the system prompt, and
//! dispatches any `<use_mcp_tool>` block found in the model's reply. The
//! crate also ships the `weather-server` binary built on [`mcp_server`].

pub mod agent_core;
pub mod config;
pub mod inference;
pub mod logging;
pub mod mcp_client;
pub mod mcp_server;
pub mod protocol;
pub mod weather;
