//! Agent Core — orchestration layer for the chat client.
//!
//! Submodules:
//! - `bootstrap`: Connects configured servers into the session registry
//! - `prompt`: Builds the system prompt from a template and tool catalogs
//! - `dispatcher`: Runs a parsed tool call against the right session
//! - `conversation`: Per-turn model call, directive check, dispatch
//! - `chat_loop`: Line-oriented interactive loop
//! - `errors`: Dispatch error types

pub mod bootstrap;
pub mod chat_loop;
pub mod conversation;
pub mod dispatcher;
pub mod errors;
pub mod prompt;

// Re-exports for convenience
pub use bootstrap::connect_all;
pub use chat_loop::{run_chat_loop, LoopExit};
pub use conversation::{ConversationDriver, Exchange, TurnOutcome};
pub use dispatcher::ToolDispatcher;
pub use errors::DispatchError;
pub use prompt::{assemble_system_prompt, DEFAULT_PROMPT_TEMPLATE, TOOL_INFO_MARKER};
