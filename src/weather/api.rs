//! OpenWeatherMap current-weather client.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use thiserror::Error;

use super::format::WeatherReport;

/// Current-weather endpoint.
pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Why weather could not be fetched. The display text is what the tool
/// returns after an `Error: ` prefix.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("OpenWeatherMap API key not set. Please set the OPENWEATHER_API_KEY environment variable.")]
    MissingApiKey,

    #[error("Failed to get weather for {city}: {reason}")]
    Request { city: String, reason: String },

    #[error("Failed to get weather for {city}: HTTP {status}: {body}")]
    Status {
        city: String,
        status: u16,
        body: String,
    },
}

/// Source of current weather by city name.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_weather(&self, city: &str) -> Result<WeatherReport, WeatherError>;
}

/// Live OpenWeatherMap lookups (metric units).
pub struct OpenWeatherMap {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

impl OpenWeatherMap {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: OPENWEATHER_URL.to_string(),
        }
    }

    /// Key from `OPENWEATHER_API_KEY`; unset or blank means no key.
    pub fn from_env() -> Self {
        let client = Self::new(std::env::var(API_KEY_ENV).ok());
        if client.api_key.is_none() {
            tracing::warn!(env = API_KEY_ENV, "API key not set, get_weather will report an error");
        }
        client
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherMap {
    async fn current_weather(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        let request_error = |reason: String| WeatherError::Request {
            city: city.to_string(),
            reason,
        };

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .map_err(|e| request_error(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(city, status = status.as_u16(), "weather lookup rejected");
            return Err(WeatherError::Status {
                city: city.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<WeatherReport>()
            .await
            .map_err(|e| request_error(format!("invalid response body: {}", e.without_url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let source = OpenWeatherMap::new(None).with_base_url("http://127.0.0.1:9/never");
        let err = source.current_weather("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
        assert_eq!(
            err.to_string(),
            "OpenWeatherMap API key not set. Please set the OPENWEATHER_API_KEY environment variable."
        );
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        assert!(!OpenWeatherMap::new(Some("  ".to_string())).has_api_key());
        assert!(OpenWeatherMap::new(Some("abc".to_string())).has_api_key());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_names_the_city() {
        let source =
            OpenWeatherMap::new(Some("key".to_string())).with_base_url("http://127.0.0.1:9/weather");
        let err = source.current_weather("Paris").await.unwrap_err();
        assert!(matches!(err, WeatherError::Request { .. }));
        assert!(err.to_string().starts_with("Failed to get weather for Paris: "));
        // The API key travels in the query string and must not leak.
        assert!(!err.to_string().contains("appid"));
    }
}
