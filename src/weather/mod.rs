//! Weather tool served by the `weather-server` binary.
//!
//! - `api`: OpenWeatherMap client behind the `WeatherSource` trait
//! - `format`: response types and text rendering
//! - `tool`: the `get_weather` [`ToolHandler`](crate::mcp_server::ToolHandler)

pub mod api;
pub mod format;
pub mod tool;

pub use api::{OpenWeatherMap, WeatherError, WeatherSource};
pub use format::{format_weather, WeatherReport};
pub use tool::WeatherTool;
