//! `weather-server` — MCP server exposing `get_weather` over stdio.

use anyhow::Context;

use toolchat::logging;
use toolchat::mcp_server::McpServer;
use toolchat::weather::{OpenWeatherMap, WeatherTool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_stderr_tracing().context("failed to initialize logging")?;

    let server = McpServer::new(
        "weather",
        env!("CARGO_PKG_VERSION"),
        WeatherTool::new(OpenWeatherMap::from_env()),
    );

    server
        .serve_stdio()
        .await
        .context("stdio transport failed")?;
    Ok(())
}
