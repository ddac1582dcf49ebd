//! OpenWeatherMap payload types and the text rendering of a report.
//!
//! Every field is optional. Missing values render as `Unknown` for text
//! and `0` for numbers.

use std::fmt;

use serde::Deserialize;
use serde_json::Number;

/// Current-weather response (only the fields we render).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WeatherReport {
    pub name: Option<String>,
    pub weather: Vec<WeatherCondition>,
    pub main: MainReadings,
    pub wind: Wind,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WeatherCondition {
    pub description: Option<String>,
}

/// Kept as JSON numbers so `15` prints as `15` and `15.5` as `15.5`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainReadings {
    pub temp: Option<Number>,
    pub humidity: Option<Number>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Wind {
    pub speed: Option<f64>,
}

impl WeatherReport {
    pub fn city(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn description(&self) -> &str {
        self.weather
            .first()
            .and_then(|w| w.description.as_deref())
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zero = Number::from(0);
        writeln!(f, "City: {}", self.city())?;
        writeln!(f, "Weather: {}", self.description())?;
        writeln!(f, "Temperature: {}°C", self.main.temp.as_ref().unwrap_or(&zero))?;
        writeln!(f, "Humidity: {}%", self.main.humidity.as_ref().unwrap_or(&zero))?;
        write!(f, "Wind Speed: {:.2} m/s", self.wind.speed.unwrap_or(0.0))
    }
}

/// Render a report as the multi-line text returned by `get_weather`.
pub fn format_weather(report: &WeatherReport) -> String {
    report.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn london() -> WeatherReport {
        serde_json::from_value(json!({
            "name": "London",
            "weather": [{"description": "scattered clouds"}],
            "main": {"temp": 15.5, "humidity": 75},
            "wind": {"speed": 3.2}
        }))
        .unwrap()
    }

    #[test]
    fn test_format_weather_data() {
        let formatted = format_weather(&london());
        assert!(formatted.contains("London"));
        assert!(formatted.contains("scattered clouds"));
        assert!(formatted.contains("15.5°C"));
        assert!(formatted.contains("75%"));
        assert!(formatted.contains("3.20 m/s"));
    }

    #[test]
    fn test_format_exact_layout() {
        assert_eq!(
            format_weather(&london()),
            "City: London\nWeather: scattered clouds\nTemperature: 15.5°C\n\
             Humidity: 75%\nWind Speed: 3.20 m/s"
        );
    }

    #[test]
    fn test_format_weather_data_missing_fields() {
        let report: WeatherReport = serde_json::from_value(json!({"name": "TestCity"})).unwrap();
        let formatted = format_weather(&report);
        assert!(formatted.contains("TestCity"));
        assert!(formatted.contains("Weather: Unknown"));
        assert!(formatted.contains("0°C"));
        assert!(formatted.contains("Humidity: 0%"));
        assert!(formatted.contains("Wind Speed: 0.00 m/s"));
    }

    #[test]
    fn test_empty_payload_uses_all_defaults() {
        let report: WeatherReport = serde_json::from_value(json!({})).unwrap();
        assert_eq!(report.city(), "Unknown");
        assert_eq!(report.description(), "Unknown");
    }

    #[test]
    fn test_extra_fields_ignored() {
        let report: WeatherReport = serde_json::from_value(json!({
            "name": "Oslo",
            "cod": 200,
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky"}],
            "main": {"temp": -3, "feels_like": -8.1, "humidity": 60}
        }))
        .unwrap();
        let formatted = format_weather(&report);
        assert!(formatted.contains("Temperature: -3°C"));
        assert!(formatted.contains("clear sky"));
    }
}
