//! Application configuration loading and validation.
//!
//! Reads `toolchat.yaml` and resolves environment variables. The config
//! names the model endpoint, an optional prompt template, and the ordered
//! list of tool servers to launch at startup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::mcp_client::ServerConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "toolchat.yaml";

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "TOOLCHAT_CONFIG";

/// Binary name of the bundled weather server.
pub const WEATHER_SERVER_BIN: &str = "weather-server";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while locating, reading, or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("server '{name}' is listed more than once")]
    DuplicateServer { name: String },

    #[error("invalid server entry '{name}': {reason}")]
    InvalidServer { name: String, reason: String },

    #[error("invalid model settings: {reason}")]
    InvalidModel { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Chat completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model_name: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model_name: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
        }
    }
}

/// Top-level configuration (mirrors `toolchat.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    /// Prompt template file. Relative paths resolve against the config
    /// file's directory.
    pub prompt_path: Option<PathBuf>,
    /// Servers in launch order.
    pub servers: Vec<ServerConfig>,
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` on the command line.
    Flag(PathBuf),
    /// The `TOOLCHAT_CONFIG` environment variable.
    Env(PathBuf),
    /// Found by searching upward from the working directory.
    Discovered(PathBuf),
    /// No file; compiled-in defaults.
    BuiltIn,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Flag(p) | ConfigSource::Env(p) | ConfigSource::Discovered(p) => Some(p),
            ConfigSource::BuiltIn => None,
        }
    }
}

impl AppConfig {
    /// Defaults used when no config file exists: the DeepSeek endpoint and
    /// the `weather-server` binary installed next to the running executable.
    pub fn builtin() -> Self {
        Self {
            model: ModelConfig::default(),
            prompt_path: None,
            servers: vec![ServerConfig::command("weather", &sibling_binary(WEATHER_SERVER_BIN))],
        }
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidModel {
                reason: "base_url is empty".into(),
            });
        }
        if self.model.model_name.trim().is_empty() {
            return Err(ConfigError::InvalidModel {
                reason: "model_name is empty".into(),
            });
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::InvalidModel {
                reason: "max_tokens must be positive".into(),
            });
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::InvalidServer {
                    name: server.name.clone(),
                    reason: "name is empty".into(),
                });
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateServer {
                    name: server.name.clone(),
                });
            }
            server
                .launch_command()
                .map_err(|e| ConfigError::InvalidServer {
                    name: server.name.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Decide which config file to use.
///
/// Order: explicit flag, `TOOLCHAT_CONFIG`, upward search from `start` for
/// `toolchat.yaml`, then built-in defaults. An explicit path that does not
/// exist is an error rather than a silent fallback.
pub fn resolve_config_source(
    flag: Option<&Path>,
    start: &Path,
) -> Result<ConfigSource, ConfigError> {
    if let Some(path) = flag {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(ConfigSource::Flag(path.to_path_buf()));
    }

    if let Some(value) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return Ok(ConfigSource::Env(path));
    }

    Ok(find_config_path(start)
        .map(ConfigSource::Discovered)
        .unwrap_or(ConfigSource::BuiltIn))
}

/// Search upward from `start` for `toolchat.yaml`.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Resolve and load the configuration.
pub fn load(flag: Option<&Path>, start: &Path) -> Result<(AppConfig, ConfigSource), ConfigError> {
    let source = resolve_config_source(flag, start)?;
    let config = match source.path() {
        Some(path) => load_from_path(path)?,
        None => {
            let config = AppConfig::builtin();
            config.validate()?;
            config
        }
    };
    Ok((config, source))
}

/// Load, interpolate, and validate a config file.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut config = parse_config(&raw, &path.display().to_string())?;

    // Relative paths in the file are relative to the file, not the cwd.
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    if let Some(prompt) = config.prompt_path.take() {
        let resolved = resolve_file_path(dir, &prompt.to_string_lossy());
        config.prompt_path = Some(PathBuf::from(resolved));
    }
    for server in &mut config.servers {
        if let Some(script) = server.script.take() {
            server.script = Some(resolve_file_path(dir, &script));
        }
        if let Some(cwd) = server.cwd.take() {
            server.cwd = Some(resolve_file_path(dir, &cwd));
        }
    }

    Ok(config)
}

/// Expand a leading `~`, then anchor a relative path at `dir`.
fn resolve_file_path(dir: &Path, raw: &str) -> String {
    let expanded = PathBuf::from(expand_tilde(raw));
    if expanded.is_relative() {
        dir.join(expanded).display().to_string()
    } else {
        expanded.display().to_string()
    }
}

/// Parse YAML text into a validated config.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn parse_config(raw: &str, origin: &str) -> Result<AppConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);

    let config: AppConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;

    config.validate()?;
    Ok(config)
}

/// Read a prompt template from disk.
pub fn read_prompt_template(path: &Path) -> Result<String, ConfigError> {
    let path = PathBuf::from(expand_tilde(&path.to_string_lossy()));
    std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
        path,
        reason: e.to_string(),
    })
}

/// Path of a binary shipped alongside the current executable, or the bare
/// name (resolved via `PATH`) if the executable location is unknown.
fn sibling_binary(name: &str) -> String {
    let file_name = format!("{name}{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(&file_name))
        .filter(|candidate| candidate.exists())
        .map(|candidate| candidate.display().to_string())
        .unwrap_or(file_name)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`. Unset and empty both take the default.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => std::env::var(var_name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
