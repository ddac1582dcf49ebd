//! Bootstrap — connect every configured server into the registry.

use crate::mcp_client::{McpError, ServerConfig, SessionLauncher, SessionRegistry};

/// Launch each server in configuration order and register it.
///
/// Stops at the first failure. Sessions registered before the failure stay
/// in `registry`; the caller releases them with
/// [`SessionRegistry::shutdown`].
pub async fn connect_all<L: SessionLauncher + ?Sized>(
    launcher: &L,
    servers: &[ServerConfig],
    registry: &mut SessionRegistry,
) -> Result<(), McpError> {
    for config in servers {
        tracing::info!(server = %config.name, "connecting to server");

        let launched = match launcher.launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                tracing::error!(
                    server = %config.name,
                    error = %e,
                    connected = registry.len(),
                    "server failed to start, aborting bootstrap"
                );
                return Err(e);
            }
        };

        registry.register(&config.name, launched.tools, launched.session)?;
    }

    tracing::info!(servers = registry.len(), "bootstrap complete");
    Ok(())
}
