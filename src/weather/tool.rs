//! The `get_weather` tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::api::WeatherSource;
use super::format::format_weather;
use crate::mcp_server::{ToolError, ToolHandler};
use crate::protocol::{CallToolResult, ToolDescriptor};

pub const TOOL_NAME: &str = "get_weather";

/// Serves `get_weather` from any [`WeatherSource`].
pub struct WeatherTool<S> {
    source: S,
}

impl<S: WeatherSource> WeatherTool<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: "Get the current weather for a city using the OpenWeatherMap API."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "City name, e.g. \"London\" or \"Paris,FR\""
                    }
                },
                "required": ["city"]
            }),
        }
    }

    /// Formatted report, or `Error: <reason>` text. Never fails.
    pub async fn get_weather(&self, city: &str) -> String {
        match self.source.current_weather(city).await {
            Ok(report) => format_weather(&report),
            Err(e) => {
                tracing::warn!(city, error = %e, "weather lookup failed");
                format!("Error: {e}")
            }
        }
    }
}

#[async_trait]
impl<S: WeatherSource> ToolHandler for WeatherTool<S> {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![Self::descriptor()]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ToolError> {
        if name != TOOL_NAME {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            });
        }

        let city = arguments
            .get("city")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: TOOL_NAME.to_string(),
                reason: "'city' must be a non-empty string".to_string(),
            })?;

        Ok(CallToolResult::text(self.get_weather(city).await))
    }
}
