//! System prompt assembly.
//!
//! The prompt is built once, after bootstrap, from a template and the tool
//! catalogs of every connected server. Nothing mutates it afterwards.

use crate::protocol::ToolDescriptor;

/// Marker in the template replaced by the rendered tool catalog.
pub const TOOL_INFO_MARKER: &str = "<$MCP_INFO$>";

/// Template compiled into the binary, used when no `prompt_path` is set.
pub const DEFAULT_PROMPT_TEMPLATE: &str = include_str!("../../prompts/tool_prompt.txt");

/// Rendered in place of the catalog when no server advertised any tool.
const NO_TOOLS_TEXT: &str = "No tools are currently available.";

/// Build the final system prompt.
///
/// Each tool renders as
/// `## <server>\n### Available Tools\n- <tool>\n<description>\n<schema>`,
/// in server order then catalog order, entries joined by a newline. The
/// result replaces [`TOOL_INFO_MARKER`]; a template without the marker gets
/// the section appended after a blank line.
pub fn assemble_system_prompt<'a, I>(template: &str, catalogs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a [ToolDescriptor])>,
{
    let entries: Vec<String> = catalogs
        .into_iter()
        .flat_map(|(server, tools)| tools.iter().map(move |tool| render_tool(server, tool)))
        .collect();

    let section = if entries.is_empty() {
        NO_TOOLS_TEXT.to_string()
    } else {
        entries.join("\n")
    };

    if template.contains(TOOL_INFO_MARKER) {
        template.replace(TOOL_INFO_MARKER, &section)
    } else {
        format!("{}\n\n{section}", template.trim_end())
    }
}

fn render_tool(server: &str, tool: &ToolDescriptor) -> String {
    let schema = serde_json::to_string(&tool.input_schema).unwrap_or_else(|_| "{}".to_string());
    format!(
        "## {server}\n### Available Tools\n- {}\n{}\n{schema}",
        tool.name, tool.description
    )
}
