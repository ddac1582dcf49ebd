//! ToolDispatcher — resolves a parsed tool call to a session and runs it.
//!
//! Dispatch always yields text. Every failure along the way (unknown server,
//! unknown tool, missing arguments, transport error, tool-reported error) is
//! rendered as `Error calling tool <tool>: <reason>` so the turn can continue.

use std::time::Instant;

use crate::inference::ToolCallRequest;
use crate::mcp_client::{McpError, SessionRegistry};
use crate::protocol::CallToolResult;

use super::errors::DispatchError;

/// Dispatches tool calls against the sessions held by a registry.
pub struct ToolDispatcher<'r> {
    registry: &'r SessionRegistry,
}

impl<'r> ToolDispatcher<'r> {
    pub fn new(registry: &'r SessionRegistry) -> Self {
        Self { registry }
    }

    /// Run the call and return its normalized text, or error text.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> String {
        let start = Instant::now();
        let outcome = self.try_dispatch(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                tracing::info!(
                    server = %request.server_name,
                    tool = %request.tool_name,
                    elapsed_ms,
                    result_len = text.len(),
                    "tool call succeeded"
                );
                text
            }
            Err(e) => {
                tracing::warn!(
                    server = %request.server_name,
                    tool = %request.tool_name,
                    elapsed_ms,
                    error = %e,
                    "tool call failed"
                );
                format!("Error calling tool {}: {e}", request.tool_name)
            }
        }
    }

    /// Resolve, validate, and invoke. Errors are returned, not rendered.
    pub async fn try_dispatch(&self, request: &ToolCallRequest) -> Result<String, DispatchError> {
        let entry = self.registry.get(&request.server_name).map_err(|e| match e {
            McpError::ServerNotFound { name } => DispatchError::UnknownServer { server: name },
            other => DispatchError::Transport(other),
        })?;

        let tool = entry
            .tool(&request.tool_name)
            .ok_or_else(|| DispatchError::UnknownTool {
                server: request.server_name.clone(),
                tool: request.tool_name.clone(),
            })?;

        let missing: Vec<String> = tool
            .required_arguments()
            .into_iter()
            .filter(|field| !request.arguments.contains_key(*field))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(DispatchError::InvalidArguments { missing });
        }

        let result = entry
            .session()
            .call_tool(&request.tool_name, request.arguments_value())
            .await?;

        let text = normalize_result(&result);
        if result.is_error {
            return Err(DispatchError::ToolFailed { text });
        }
        Ok(text)
    }
}

/// Text of a tool result: text items joined by newlines, or the compact
/// JSON of the whole result when no item carries text. Never empty.
pub fn normalize_result(result: &CallToolResult) -> String {
    result.joined_text().unwrap_or_else(|| {
        serde_json::to_string(result).unwrap_or_else(|_| format!("{result:?}"))
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::mcp_client::registry::tests::RecordingSession;
    use crate::protocol::{ContentItem, ToolDescriptor};

    fn weather_tool() -> ToolDescriptor {
        ToolDescriptor {
            name: "get_weather".to_string(),
            description: "Get weather".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        }
    }

    fn request(server: &str, tool: &str, args: Value) -> ToolCallRequest {
        let arguments: Map<String, Value> = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCallRequest {
            server_name: server.to_string(),
            tool_name: tool.to_string(),
            arguments,
        }
    }

    fn registry_with(reply: CallToolResult, log: &Arc<Mutex<Vec<String>>>) -> SessionRegistry {
        let mut registry = SessionRegistry::new();
        registry
            .register(
                "weather",
                vec![weather_tool()],
                Box::new(RecordingSession {
                    name: "weather".to_string(),
                    log: Arc::clone(log),
                    reply,
                }),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_unknown_server_names_the_server() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(CallToolResult::text("unused"), &log);
        let dispatcher = ToolDispatcher::new(&registry);

        let text = dispatcher
            .dispatch(&request("forecast", "get_weather", json!({"city": "Paris"})))
            .await;

        assert!(text.starts_with("Error calling tool get_weather: "));
        assert!(text.contains("forecast"));
        assert!(log.lock().unwrap().iter().all(|e| !e.starts_with("call:")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected_before_call() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(CallToolResult::text("unused"), &log);
        let dispatcher = ToolDispatcher::new(&registry);

        let err = dispatcher
            .try_dispatch(&request("weather", "get_forecast", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTool { .. }));
        assert!(log.lock().unwrap().iter().all(|e| !e.starts_with("call:")));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(CallToolResult::text("unused"), &log);
        let dispatcher = ToolDispatcher::new(&registry);

        let text = dispatcher
            .dispatch(&request("weather", "get_weather", json!({"town": "Paris"})))
            .await;
        assert_eq!(
            text,
            "Error calling tool get_weather: missing required argument(s): city"
        );
    }

    #[tokio::test]
    async fn test_text_items_joined_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reply = CallToolResult {
            content: vec![ContentItem::text("a"), ContentItem::text("b")],
            is_error: false,
        };
        let registry = registry_with(reply, &log);
        let dispatcher = ToolDispatcher::new(&registry);

        let text = dispatcher
            .dispatch(&request("weather", "get_weather", json!({"city": "London"})))
            .await;
        assert_eq!(text, "a\nb");
        assert_eq!(
            log.lock().unwrap().first().map(String::as_str),
            Some("call:weather:get_weather")
        );
    }

    #[tokio::test]
    async fn test_no_text_content_falls_back_to_json() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reply = CallToolResult {
            content: vec![ContentItem {
                kind: "image".to_string(),
                text: None,
            }],
            is_error: false,
        };
        let registry = registry_with(reply, &log);
        let dispatcher = ToolDispatcher::new(&registry);

        let text = dispatcher
            .dispatch(&request("weather", "get_weather", json!({"city": "London"})))
            .await;
        assert!(!text.is_empty());
        assert!(text.contains("image"));
    }

    #[test]
    fn test_normalize_empty_result_is_not_empty() {
        let text = normalize_result(&CallToolResult::default());
        assert_eq!(text, r#"{"content":[],"isError":false}"#);
    }

    struct BrokenPipeSession;

    #[async_trait::async_trait]
    impl crate::mcp_client::ToolSession for BrokenPipeSession {
        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<CallToolResult, McpError> {
            Err(McpError::TransportError {
                server: "weather".to_string(),
                reason: "server closed stdout".to_string(),
            })
        }

        async fn close(&mut self) {}
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_text() {
        let mut registry = SessionRegistry::new();
        registry
            .register("weather", vec![weather_tool()], Box::new(BrokenPipeSession))
            .unwrap();
        let dispatcher = ToolDispatcher::new(&registry);

        let text = dispatcher
            .dispatch(&request("weather", "get_weather", json!({"city": "London"})))
            .await;
        assert_eq!(
            text,
            "Error calling tool get_weather: transport error for server 'weather': server closed stdout"
        );
    }

    #[tokio::test]
    async fn test_tool_reported_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reply = CallToolResult {
            content: vec![ContentItem::text("city not found")],
            is_error: true,
        };
        let registry = registry_with(reply, &log);
        let dispatcher = ToolDispatcher::new(&registry);

        let text = dispatcher
            .dispatch(&request("weather", "get_weather", json!({"city": "Atlantis"})))
            .await;
        assert_eq!(
            text,
            "Error calling tool get_weather: tool reported an error: city not found"
        );
    }
}
