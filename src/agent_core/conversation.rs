//! Conversation driver — one user input in, one turn outcome out.
//!
//! Each turn sends the system prompt plus the framed user input to the
//! model, looks for a tool directive in the reply, and dispatches it when one
//! is present. Model failures end the turn, never the session.

use tracing::Instrument;
use uuid::Uuid;

use crate::inference::{
    parse_directive, ChatMessage, ChatModel, Directive, DirectiveError, ToolCallRequest,
};

use super::dispatcher::ToolDispatcher;

// ─── Types ───────────────────────────────────────────────────────────────────

/// How a single turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The model answered in plain text.
    Reply { text: String },
    /// The reply contained a tool block that could not be used; the raw
    /// text is the answer.
    Fallback { text: String, error: DirectiveError },
    /// A tool was called; `result` is the dispatcher's text.
    ToolCall {
        request: ToolCallRequest,
        result: String,
    },
    /// The model call itself failed.
    ModelFailed { error: String },
}

impl TurnOutcome {
    /// The text presented as the turn's final answer.
    pub fn answer(&self) -> String {
        match self {
            TurnOutcome::Reply { text } | TurnOutcome::Fallback { text, .. } => text.clone(),
            TurnOutcome::ToolCall { result, .. } => result.clone(),
            TurnOutcome::ModelFailed { error } => format!("Error processing with AI: {error}"),
        }
    }
}

/// One completed turn, kept for the session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub answer: String,
}

/// Wrap raw user input with the instruction sent on every turn.
pub fn frame_user_input(input: &str) -> String {
    format!(
        "User asks: {input}\n\nPlease respond with the appropriate tool call if needed, \
         or provide a helpful response."
    )
}

// ─── ConversationDriver ──────────────────────────────────────────────────────

/// Runs turns against a model and the connected tool sessions.
pub struct ConversationDriver<'r, M> {
    model: M,
    dispatcher: ToolDispatcher<'r>,
    system_prompt: String,
    history: Vec<Exchange>,
}

impl<'r, M: ChatModel> ConversationDriver<'r, M> {
    pub fn new(model: M, dispatcher: ToolDispatcher<'r>, system_prompt: String) -> Self {
        Self {
            model,
            dispatcher,
            system_prompt,
            history: Vec::new(),
        }
    }

    /// Completed turns, oldest first. Appended only between turns.
    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    /// Run one turn and record it.
    pub async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        let span = tracing::info_span!("turn", turn_id = %Uuid::new_v4());
        let outcome = self.execute_turn(input).instrument(span).await;

        self.history.push(Exchange {
            user: input.to_string(),
            answer: outcome.answer(),
        });
        outcome
    }

    async fn execute_turn(&self, input: &str) -> TurnOutcome {
        let messages = [
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(frame_user_input(input)),
        ];

        tracing::debug!(input_len = input.len(), "requesting completion");
        let reply = match self.model.complete(&messages).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "model call failed");
                return TurnOutcome::ModelFailed {
                    error: e.to_string(),
                };
            }
        };

        match parse_directive(&reply) {
            Directive::Absent => TurnOutcome::Reply { text: reply },
            Directive::Malformed(error) => {
                tracing::warn!(
                    error = %error,
                    argument_decode = error.is_argument_decode(),
                    "unusable tool directive, showing raw reply"
                );
                TurnOutcome::Fallback { text: reply, error }
            }
            Directive::Call(request) => {
                tracing::info!(
                    server = %request.server_name,
                    tool = %request.tool_name,
                    "model requested tool call"
                );
                let result = self.dispatcher.dispatch(&request).await;
                TurnOutcome::ToolCall { request, result }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::inference::{InferenceError, Role};
    use crate::mcp_client::registry::tests::RecordingSession;
    use crate::mcp_client::SessionRegistry;
    use crate::protocol::{CallToolResult, ToolDescriptor};

    /// Returns canned replies in order and records every message list.
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, InferenceError>>>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<Result<String, InferenceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("no more scripted replies".to_string()))
        }
    }

    pub(crate) const LONDON_DIRECTIVE: &str = "I'll look that up.\n<use_mcp_tool>\n\
        <server_name>weather</server_name>\n<tool_name>get_weather</tool_name>\n\
        <arguments>\n{\"city\": \"London\"}\n</arguments>\n</use_mcp_tool>";

    pub(crate) const LONDON_REPORT: &str = "City: London\nWeather: light rain\n\
        Temperature: 12.3°C\nHumidity: 81%\nWind Speed: 4.10 m/s";

    pub(crate) fn weather_registry(log: &Arc<Mutex<Vec<String>>>) -> SessionRegistry {
        let mut registry = SessionRegistry::new();
        registry
            .register(
                "weather",
                vec![ToolDescriptor {
                    name: "get_weather".to_string(),
                    description: "Get current weather for a city".to_string(),
                    input_schema: json!({"type": "object", "required": ["city"]}),
                }],
                Box::new(RecordingSession {
                    name: "weather".to_string(),
                    log: Arc::clone(log),
                    reply: CallToolResult::text(LONDON_REPORT),
                }),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_weather_question_end_to_end() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = weather_registry(&log);
        let model = ScriptedModel::new(vec![Ok(LONDON_DIRECTIVE.to_string())]);
        let mut driver =
            ConversationDriver::new(model, ToolDispatcher::new(&registry), "SYSTEM".to_string());

        let outcome = driver.run_turn("What's the weather in London?").await;

        match &outcome {
            TurnOutcome::ToolCall { request, result } => {
                assert_eq!(request.server_name, "weather");
                assert_eq!(request.tool_name, "get_weather");
                assert_eq!(request.arguments_value(), json!({"city": "London"}));
                assert_eq!(result, LONDON_REPORT);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
        assert_eq!(outcome.answer(), LONDON_REPORT);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["call:weather:get_weather".to_string()]
        );
    }

    #[tokio::test]
    async fn test_messages_are_system_plus_framed_user() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = weather_registry(&log);
        let model = ScriptedModel::new(vec![Ok("Hi!".to_string()), Ok("Again".to_string())]);
        let mut driver =
            ConversationDriver::new(model, ToolDispatcher::new(&registry), "SYSTEM".to_string());

        driver.run_turn("hello").await;
        driver.run_turn("second").await;

        let seen = driver.model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for (messages, input) in seen.iter().zip(["hello", "second"]) {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].role, Role::System);
            assert_eq!(messages[0].content, "SYSTEM");
            assert_eq!(messages[1].role, Role::User);
            assert_eq!(messages[1].content, frame_user_input(input));
        }
    }

    #[tokio::test]
    async fn test_plain_reply_echoed_verbatim() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = weather_registry(&log);
        let reply = "  London is lovely in May.\n";
        let model = ScriptedModel::new(vec![Ok(reply.to_string())]);
        let mut driver =
            ConversationDriver::new(model, ToolDispatcher::new(&registry), String::new());

        let outcome = driver.run_turn("Tell me about London").await;
        assert!(matches!(outcome, TurnOutcome::Reply { ref text } if text == reply));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_arguments_fall_back_to_raw_text() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = weather_registry(&log);
        let reply = "<use_mcp_tool><server_name>weather</server_name>\
                     <tool_name>get_weather</tool_name>\
                     <arguments>{city: London}</arguments></use_mcp_tool>";
        let model = ScriptedModel::new(vec![Ok(reply.to_string())]);
        let mut driver =
            ConversationDriver::new(model, ToolDispatcher::new(&registry), String::new());

        let outcome = driver.run_turn("weather?").await;
        match outcome {
            TurnOutcome::Fallback { text, error } => {
                assert_eq!(text, reply);
                assert!(error.is_argument_decode());
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_ends_turn_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = weather_registry(&log);
        let model = ScriptedModel::new(vec![
            Err(InferenceError::HttpError {
                status: 401,
                body: "Authentication Fails".to_string(),
            }),
            Ok("recovered".to_string()),
        ]);
        let mut driver =
            ConversationDriver::new(model, ToolDispatcher::new(&registry), String::new());

        let first = driver.run_turn("one").await;
        assert_eq!(
            first.answer(),
            "Error processing with AI: HTTP 401: Authentication Fails"
        );

        let second = driver.run_turn("two").await;
        assert_eq!(second.answer(), "recovered");

        let history = driver.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user, "one");
        assert_eq!(history[1].answer, "recovered");
    }

    #[test]
    fn test_frame_user_input() {
        assert_eq!(
            frame_user_input("Hi"),
            "User asks: Hi\n\nPlease respond with the appropriate tool call if needed, \
             or provide a helpful response."
        );
    }
}
