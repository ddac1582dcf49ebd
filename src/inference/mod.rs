//! Inference — model completion calls and directive extraction.
//!
//! - `client`: OpenAI-compatible chat completions over reqwest
//! - `directive`: finds the `<use_mcp_tool>` block in a completion
//! - `types`: request/response wire types

pub mod client;
pub mod directive;
pub mod errors;
pub mod types;

pub use client::{ChatModel, InferenceClient};
pub use directive::{parse_directive, Directive, DirectiveError, ToolCallRequest};
pub use errors::InferenceError;
pub use types::{ChatMessage, Role};
