//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to the configured endpoint
//! and returns the first choice's text. The conversation driver only sees the
//! [`ChatModel`] trait, so tests can swap in a scripted model.

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::ModelConfig;

// ─── ChatModel ───────────────────────────────────────────────────────────────

/// Anything that can turn a message list into a completion text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for a remote chat completions endpoint.
///
/// No request timeout is configured: a turn waits as long as the endpoint
/// takes to answer.
pub struct InferenceClient {
    http: HttpClient,
    base_url: String,
    model_name: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl InferenceClient {
    /// Build a client from the model section of the configuration.
    ///
    /// The API key is read from the environment variable the config names.
    /// A missing key is logged and requests go out without authorization.
    pub fn from_config(config: &ModelConfig) -> Result<Self, InferenceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "API key not set, model requests will be sent without authorization"
            );
        }

        Self::new(config, api_key)
    }

    /// Build a client with an explicit key.
    pub fn new(config: &ModelConfig, api_key: Option<String>) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .build()
            .map_err(|e| InferenceError::ClientSetup {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_name: config.model_name.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// The model identifier sent with each request.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Full URL of the completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        let url = self.completions_url();
        let body = ChatCompletionRequest {
            model: &self.model_name,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let start = std::time::Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::ResponseError {
                reason: format!("failed to read response body: {e}"),
            })?;

        tracing::debug!(
            model = %self.model_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = body_text.len(),
            "completion received"
        );

        parse_completion_body(&body_text)
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        self.chat_completion(messages).await
    }
}

/// Pull the first choice's message text out of a completion body.
pub fn parse_completion_body(body: &str) -> Result<String, InferenceError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseError {
            reason: format!("malformed completion JSON: {e}"),
        })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::ResponseError {
            reason: "completion has no choices".to_string(),
        })?;

    choice
        .message
        .content
        .ok_or_else(|| InferenceError::ResponseError {
            reason: "completion message has no content".to_string(),
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config(base_url: &str) -> ModelConfig {
        ModelConfig {
            base_url: base_url.to_string(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_completions_url_strips_trailing_slash() {
        let client = InferenceClient::new(&model_config("https://api.deepseek.com/"), None).unwrap();
        assert_eq!(
            client.completions_url(),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(client.model_name(), "deepseek-chat");
    }

    #[test]
    fn test_parse_completion_body_first_choice() {
        let body = r#"{
            "id": "x",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
            ]
        }"#;
        assert_eq!(parse_completion_body(body).unwrap(), "Hello!");
    }

    #[test]
    fn test_parse_completion_body_no_choices() {
        let err = parse_completion_body(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, InferenceError::ResponseError { .. }));
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn test_parse_completion_body_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(parse_completion_body(body).is_err());
    }

    #[test]
    fn test_parse_completion_body_not_json() {
        let err = parse_completion_body("<html>bad gateway</html>").unwrap_err();
        assert!(err.to_string().starts_with("invalid completion response"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_failed() {
        // Port 9 (discard) on localhost is essentially never listening.
        let client = InferenceClient::new(&model_config("http://127.0.0.1:9"), None).unwrap();
        let err = client
            .chat_completion(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::ConnectionFailed { .. }));
    }
}
