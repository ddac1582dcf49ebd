//! Server launch configuration.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::errors::McpError;

/// One tool server entry from the `servers:` list in `toolchat.yaml`.
///
/// Either `command` (an executable plus `args`) or `script` (a `.py` or
/// `.js` file run through its interpreter) must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Logical name used in directives (`<server_name>`).
    pub name: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the child process.
    #[serde(default)]
    pub cwd: Option<String>,
}

/// A resolved program + argument vector ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerConfig {
    /// Entry that runs `command` with no arguments.
    pub fn command(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: Some(command.to_string()),
            script: None,
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Resolve the program and arguments to spawn.
    ///
    /// Scripts pick their interpreter from the extension: `.py` runs under
    /// `python3` (`python` on Windows), `.js` under `node`. The script path
    /// precedes any configured `args`.
    pub fn launch_command(&self) -> Result<LaunchCommand, McpError> {
        match (&self.command, &self.script) {
            (Some(_), Some(_)) => Err(self.config_error("set either 'command' or 'script', not both")),
            (Some(command), None) => {
                if command.trim().is_empty() {
                    return Err(self.config_error("'command' is empty"));
                }
                Ok(LaunchCommand {
                    program: command.clone(),
                    args: self.args.clone(),
                })
            }
            (None, Some(script)) => {
                let interpreter = match Path::new(script).extension().and_then(|e| e.to_str()) {
                    Some("py") => default_python_command(),
                    Some("js") => "node",
                    _ => {
                        return Err(self.config_error(&format!(
                            "script '{script}' must be a .py or .js file"
                        )))
                    }
                };
                let mut args = Vec::with_capacity(self.args.len() + 1);
                args.push(script.clone());
                args.extend(self.args.iter().cloned());
                Ok(LaunchCommand {
                    program: interpreter.to_string(),
                    args,
                })
            }
            (None, None) => Err(self.config_error("one of 'command' or 'script' is required")),
        }
    }

    fn config_error(&self, reason: &str) -> McpError {
        McpError::ConfigError {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Platform-correct Python command.
///
/// macOS 12.3+ removed the `python` symlink; only `python3` exists.
/// Windows installs Python as `python.exe` via the official installer.
fn default_python_command() -> &'static str {
    if cfg!(target_os = "windows") {
        "python"
    } else {
        "python3"
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn script_entry(script: &str) -> ServerConfig {
        ServerConfig {
            script: Some(script.to_string()),
            command: None,
            ..ServerConfig::command("weather", "unused")
        }
    }

    #[test]
    fn test_command_entry_passes_args_through() {
        let mut cfg = ServerConfig::command("weather", "weather-server");
        cfg.args = vec!["--verbose".to_string()];
        let launch = cfg.launch_command().unwrap();
        assert_eq!(launch.program, "weather-server");
        assert_eq!(launch.args, vec!["--verbose"]);
    }

    #[test]
    fn test_python_script_uses_python_interpreter() {
        let launch = script_entry("mcp_server/server.py").launch_command().unwrap();
        assert!(launch.program.starts_with("python"));
        assert_eq!(launch.args, vec!["mcp_server/server.py"]);
    }

    #[test]
    fn test_js_script_uses_node() {
        let launch = script_entry("build/index.js").launch_command().unwrap();
        assert_eq!(launch.program, "node");
    }

    #[test]
    fn test_other_script_extension_rejected() {
        let err = script_entry("server.rb").launch_command().unwrap_err();
        assert!(err.to_string().contains(".py or .js"));
    }

    #[test]
    fn test_missing_command_and_script_rejected() {
        let cfg = ServerConfig {
            command: None,
            ..ServerConfig::command("weather", "x")
        };
        assert!(matches!(
            cfg.launch_command(),
            Err(McpError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_server_config_from_yaml() {
        let yaml = r#"
            name: weather
            script: servers/weather.py
            env:
              OPENWEATHER_API_KEY: abc
        "#;
        let cfg: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.name, "weather");
        assert_eq!(cfg.env.get("OPENWEATHER_API_KEY").map(String::as_str), Some("abc"));
        assert!(cfg.args.is_empty());
    }
}
