//! Directive parsing — pulls a tool call out of the model's free-text reply.
//!
//! The system prompt instructs the model to answer with a block like:
//!
//! ```text
//! <use_mcp_tool>
//! <server_name>weather</server_name>
//! <tool_name>get_weather</tool_name>
//! <arguments>
//! {"city": "London"}
//! </arguments>
//! </use_mcp_tool>
//! ```
//!
//! Model output is untrusted, so the result is a three-way [`Directive`]
//! rather than a bare request: no block at all, a fully validated call, or a
//! block that was present but unusable. Only the first block is considered.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

// ─── Markers ─────────────────────────────────────────────────────────────────

pub const BLOCK_OPEN: &str = "<use_mcp_tool>";
pub const BLOCK_CLOSE: &str = "</use_mcp_tool>";

pub const FIELD_SERVER: &str = "server_name";
pub const FIELD_TOOL: &str = "tool_name";
pub const FIELD_ARGUMENTS: &str = "arguments";

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

// ─── Types ───────────────────────────────────────────────────────────────────

/// A validated request to invoke one tool on one server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRequest {
    pub server_name: String,
    pub tool_name: String,
    /// Always a JSON object.
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    /// Arguments as a `serde_json::Value` for the wire.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Outcome of scanning a completion for a tool-invocation block.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// No complete block in the text. The normal case for plain answers.
    Absent,
    /// A block with all three fields present and valid.
    Call(ToolCallRequest),
    /// A block was found but could not be turned into a request.
    Malformed(DirectiveError),
}

/// Why a tool-invocation block was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("tool call is missing the <{field}> field")]
    MissingField { field: &'static str },

    #[error("<{field}> must contain text only, found nested markup")]
    NotALeaf { field: &'static str },

    #[error("<{field}> is empty")]
    EmptyField { field: &'static str },

    #[error("arguments are not valid JSON: {reason}")]
    InvalidArgumentsJson { reason: String },

    #[error("arguments must be a JSON object, got {found}")]
    ArgumentsNotObject { found: &'static str },
}

impl DirectiveError {
    /// Whether the block was structurally fine but its arguments payload
    /// could not be decoded.
    pub fn is_argument_decode(&self) -> bool {
        matches!(
            self,
            DirectiveError::InvalidArgumentsJson { .. } | DirectiveError::ArgumentsNotObject { .. }
        )
    }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Scan `text` for the first tool-invocation block.
pub fn parse_directive(text: &str) -> Directive {
    let Some(block) = first_block(text) else {
        return Directive::Absent;
    };

    match parse_block(block) {
        Ok(request) => Directive::Call(request),
        Err(e) => Directive::Malformed(e),
    }
}

/// Content between the first opening marker and the first closing marker
/// that follows it.
fn first_block(text: &str) -> Option<&str> {
    let start = text.find(BLOCK_OPEN)? + BLOCK_OPEN.len();
    let len = text[start..].find(BLOCK_CLOSE)?;
    Some(&text[start..start + len])
}

fn parse_block(block: &str) -> Result<ToolCallRequest, DirectiveError> {
    let server_name = leaf_text(block, FIELD_SERVER)?;
    if server_name.is_empty() {
        return Err(DirectiveError::EmptyField {
            field: FIELD_SERVER,
        });
    }

    let tool_name = leaf_text(block, FIELD_TOOL)?;
    if tool_name.is_empty() {
        return Err(DirectiveError::EmptyField { field: FIELD_TOOL });
    }

    let raw_arguments = leaf_text(block, FIELD_ARGUMENTS)?;
    let arguments = decode_arguments(&raw_arguments)?;

    Ok(ToolCallRequest {
        server_name,
        tool_name,
        arguments,
    })
}

/// Text of the `<field>...</field>` leaf inside `block`: trimmed, CDATA
/// unwrapped or entities decoded.
fn leaf_text(block: &str, field: &'static str) -> Result<String, DirectiveError> {
    let (_, start) =
        find_tag(block, &format!("<{field}")).ok_or(DirectiveError::MissingField { field })?;
    let (len, _) = find_tag(&block[start..], &format!("</{field}"))
        .ok_or(DirectiveError::MissingField { field })?;

    let inner = block[start..start + len].trim();

    if let Some(cdata) = inner
        .strip_prefix(CDATA_OPEN)
        .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
    {
        if cdata.contains(CDATA_CLOSE) {
            return Err(DirectiveError::NotALeaf { field });
        }
        return Ok(cdata.trim().to_string());
    }

    if inner.contains('<') {
        return Err(DirectiveError::NotALeaf { field });
    }

    Ok(decode_entities(inner))
}

/// Locate `<prefix>` allowing whitespace before the `>`, so `<server_name >`
/// matches but `<server_names>` does not. Returns the tag's start and the
/// offset just past its `>`.
fn find_tag(text: &str, prefix: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(i) = text[from..].find(prefix) {
        let tag_start = from + i;
        let after = &text[tag_start + prefix.len()..];
        let rest = after.trim_start();
        if rest.starts_with('>') {
            let end = tag_start + prefix.len() + (after.len() - rest.len()) + 1;
            return Some((tag_start, end));
        }
        from = tag_start + prefix.len();
    }
    None
}

/// Decode the five predefined XML entities and numeric character
/// references (`&#39;`, `&#x27;`).
///
/// Unknown or invalid references are left as-is.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .iter()
        .find(|(entity, _)| tail.starts_with(entity));

        match decoded {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &tail[entity.len()..];
            }
            None if tail.starts_with("&#") => match decode_char_ref(tail) {
                Some((ch, consumed)) => {
                    out.push(ch);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode a `&#NNN;` or `&#xHH;` reference at the start of `tail`.
/// Returns the character and the number of bytes consumed.
fn decode_char_ref(tail: &str) -> Option<(char, usize)> {
    let semi = tail.find(';')?;
    let body = &tail[2..semi];
    let code = match body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
        Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) => {
            body.parse().ok()?
        }
        None => return None,
    };
    char::from_u32(code).map(|ch| (ch, semi + 1))
}

fn decode_arguments(raw: &str) -> Result<Map<String, Value>, DirectiveError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DirectiveError::InvalidArgumentsJson {
            reason: e.to_string(),
        })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(DirectiveError::ArgumentsNotObject {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
