//! Session registry — owns every live server session, keyed by logical name.
//!
//! Provides:
//! - Registration during bootstrap (sequential, duplicate names rejected)
//! - Lookup by server name for dispatch
//! - Ordered catalog enumeration for system prompt assembly
//! - Release of all sessions in reverse acquisition order, exactly once

use super::errors::McpError;
use super::session::ToolSession;
use crate::protocol::ToolDescriptor;

// ─── RegisteredSession ───────────────────────────────────────────────────────

/// A live session plus the catalog it advertised at handshake time.
pub struct RegisteredSession {
    pub name: String,
    pub tools: Vec<ToolDescriptor>,
    session: Box<dyn ToolSession>,
}

impl RegisteredSession {
    /// The underlying connection.
    pub fn session(&self) -> &dyn ToolSession {
        self.session.as_ref()
    }

    /// Look up a tool in this session's catalog.
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}

// ─── SessionRegistry ─────────────────────────────────────────────────────────

/// Registry of live sessions, kept as a stack in acquisition order.
///
/// Written only during bootstrap; lookups take `&self`. Sessions are released
/// last-in-first-out by [`SessionRegistry::shutdown`], or by `Drop` for
/// anything still registered when the registry goes away.
#[derive(Default)]
pub struct SessionRegistry {
    entries: Vec<RegisteredSession>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under `name`.
    ///
    /// On a duplicate name the new session is released immediately and the
    /// existing one stays registered.
    pub fn register(
        &mut self,
        name: &str,
        tools: Vec<ToolDescriptor>,
        session: Box<dyn ToolSession>,
    ) -> Result<(), McpError> {
        if self.contains(name) {
            return Err(McpError::DuplicateServer {
                name: name.to_string(),
            });
        }

        tracing::debug!(server = name, tool_count = tools.len(), "session registered");
        self.entries.push(RegisteredSession {
            name: name.to_string(),
            tools,
            session,
        });
        Ok(())
    }

    /// Look up a session by logical name.
    pub fn get(&self, name: &str) -> Result<&RegisteredSession, McpError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| McpError::ServerNotFound {
                name: name.to_string(),
            })
    }

    /// Whether a session is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// `(server name, catalog)` pairs in registration order.
    pub fn catalogs(&self) -> impl Iterator<Item = (&str, &[ToolDescriptor])> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.tools.as_slice()))
    }

    /// Registered server names in registration order.
    pub fn server_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close and release every session, most recently registered first.
    pub async fn shutdown(mut self) {
        let count = self.entries.len();
        while let Some(mut entry) = self.entries.pop() {
            tracing::info!(server = %entry.name, "closing session");
            entry.session.close().await;
        }
        tracing::info!(released = count, "all sessions released");
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::warn!(
                remaining = self.entries.len(),
                "registry dropped with live sessions, releasing without graceful close"
            );
        }
        while let Some(entry) = self.entries.pop() {
            drop(entry);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::protocol::CallToolResult;

    /// Records `close:<name>` and `release:<name>` events into a shared log.
    pub(crate) struct RecordingSession {
        pub name: String,
        pub log: Arc<Mutex<Vec<String>>>,
        pub reply: CallToolResult,
    }

    impl RecordingSession {
        pub(crate) fn boxed(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn ToolSession> {
            Box::new(Self {
                name: name.to_string(),
                log: Arc::clone(log),
                reply: CallToolResult::text(format!("reply from {name}")),
            })
        }
    }

    #[async_trait]
    impl ToolSession for RecordingSession {
        async fn call_tool(
            &self,
            name: &str,
            _arguments: serde_json::Value,
        ) -> Result<CallToolResult, McpError> {
            self.log.lock().unwrap().push(format!("call:{}:{name}", self.name));
            Ok(self.reply.clone())
        }

        async fn close(&mut self) {
            self.log.lock().unwrap().push(format!("close:{}", self.name));
        }
    }

    impl Drop for RecordingSession {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(format!("release:{}", self.name));
        }
    }

    fn events(log: &Arc<Mutex<Vec<String>>>, prefix: &str) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = SessionRegistry::new();
        let err = registry.get("weather").err().unwrap();
        assert!(matches!(err, McpError::ServerNotFound { ref name } if name == "weather"));
    }

    #[test]
    fn test_duplicate_registration_rejected_and_released() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SessionRegistry::new();
        registry
            .register("weather", vec![tool("get_weather")], RecordingSession::boxed("first", &log))
            .unwrap();

        let err = registry
            .register("weather", vec![], RecordingSession::boxed("second", &log))
            .unwrap_err();
        assert!(matches!(err, McpError::DuplicateServer { .. }));
        assert_eq!(events(&log, "release:"), vec!["release:second"]);

        // The original session is still the one registered.
        assert_eq!(registry.get("weather").unwrap().tools.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_catalogs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SessionRegistry::new();
        registry.register("zeta", vec![tool("z")], RecordingSession::boxed("zeta", &log)).unwrap();
        registry.register("alpha", vec![tool("a")], RecordingSession::boxed("alpha", &log)).unwrap();

        let names: Vec<&str> = registry.catalogs().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(registry.server_names(), vec!["zeta", "alpha"]);
        assert!(registry.get("alpha").unwrap().tool("a").is_some());
        assert!(registry.get("alpha").unwrap().tool("z").is_none());
    }

    #[tokio::test]
    async fn test_shutdown_releases_in_reverse_order_exactly_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SessionRegistry::new();
        for name in ["one", "two", "three"] {
            registry.register(name, vec![], RecordingSession::boxed(name, &log)).unwrap();
        }

        registry.shutdown().await;

        assert_eq!(
            events(&log, "close:"),
            vec!["close:three", "close:two", "close:one"]
        );
        assert_eq!(
            events(&log, "release:"),
            vec!["release:three", "release:two", "release:one"]
        );
    }

    #[test]
    fn test_drop_releases_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut registry = SessionRegistry::new();
            registry.register("a", vec![], RecordingSession::boxed("a", &log)).unwrap();
            registry.register("b", vec![], RecordingSession::boxed("b", &log)).unwrap();
        }
        assert_eq!(events(&log, "release:"), vec!["release:b", "release:a"]);
        assert!(events(&log, "close:").is_empty());
    }

    #[tokio::test]
    async fn test_repeated_start_stop_cycles_leak_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..5 {
            let mut registry = SessionRegistry::new();
            for name in ["a", "b", "c"] {
                registry.register(name, vec![], RecordingSession::boxed(name, &log)).unwrap();
            }
            registry.shutdown().await;
        }
        assert_eq!(events(&log, "release:").len(), 15);
        assert_eq!(events(&log, "close:").len(), 15);
    }
}
