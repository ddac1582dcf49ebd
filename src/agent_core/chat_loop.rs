//! Interactive chat loop over line-oriented input and output.
//!
//! Reads one line per turn, hands it to the [`ConversationDriver`], and
//! prints the outcome. `quit`, `exit` and `bye` end the session, as do end
//! of input and an interrupt.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use crate::inference::ChatModel;

use super::conversation::{ConversationDriver, TurnOutcome};

/// Inputs that end the session (compared case-insensitively).
pub const QUIT_WORDS: [&str; 3] = ["quit", "exit", "bye"];

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The user typed a quit word.
    Quit,
    /// Input reached end of file.
    EndOfInput,
    /// An interrupt was signalled.
    Interrupted,
}

pub fn is_quit_word(input: &str) -> bool {
    QUIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Run turns until the user quits, input ends, or `interrupt` flips to true.
///
/// An interrupt while waiting for input ends the loop at once. An interrupt
/// that arrives mid-turn lets the in-flight call finish; the loop exits
/// before reading the next line.
pub async fn run_chat_loop<M, R, W>(
    driver: &mut ConversationDriver<'_, M>,
    input: R,
    output: &mut W,
    mut interrupt: watch::Receiver<bool>,
) -> std::io::Result<LoopExit>
where
    M: ChatModel,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    print_banner(output)?;
    let mut lines = input.lines();

    loop {
        if *interrupt.borrow() {
            writeln!(output, "\nExiting...")?;
            return Ok(LoopExit::Interrupted);
        }

        write!(output, "\nYou: ")?;
        output.flush()?;

        let line = tokio::select! {
            biased;
            _ = wait_for_interrupt(&mut interrupt) => {
                writeln!(output, "\nExiting...")?;
                return Ok(LoopExit::Interrupted);
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            writeln!(output)?;
            writeln!(output, "Goodbye!")?;
            return Ok(LoopExit::EndOfInput);
        };

        let input = line.trim();
        if is_quit_word(input) {
            writeln!(output, "Goodbye!")?;
            return Ok(LoopExit::Quit);
        }
        if input.is_empty() {
            continue;
        }

        writeln!(output, "Processing your request...")?;
        output.flush()?;

        let outcome = driver.run_turn(input).await;
        print_outcome(output, &outcome)?;
        output.flush()?;
    }
}

/// Resolves once the flag is true. Pends forever if the sender is gone.
async fn wait_for_interrupt(interrupt: &mut watch::Receiver<bool>) {
    loop {
        if *interrupt.borrow_and_update() {
            return;
        }
        if interrupt.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn print_banner<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "\n=== MCP Weather Chat ===")?;
    writeln!(output, "Type 'quit' to exit, or ask questions about weather!")?;
    writeln!(output, "Example: 'What's the weather in London?'")
}

/// Print a turn. Tool calls show server, tool and arguments before the result.
pub fn print_outcome<W: Write>(output: &mut W, outcome: &TurnOutcome) -> std::io::Result<()> {
    match outcome {
        TurnOutcome::ToolCall { request, result } => {
            let arguments = serde_json::to_string(&request.arguments)
                .unwrap_or_else(|_| "{}".to_string());
            writeln!(output, "AI suggested tool call")?;
            writeln!(output, "Server: {}", request.server_name)?;
            writeln!(output, "Tool: {}", request.tool_name)?;
            writeln!(output, "Arguments: {arguments}")?;
            writeln!(output, "Result: {result}")
        }
        TurnOutcome::Fallback { error, .. } => {
            writeln!(output, "Warning: ignoring tool call, {error}")?;
            writeln!(output, "AI Response: {}", outcome.answer())
        }
        TurnOutcome::Reply { .. } | TurnOutcome::ModelFailed { .. } => {
            writeln!(output, "AI Response: {}", outcome.answer())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
