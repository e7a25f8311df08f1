//! Configuration loading, validation, and credential resolution for handoff.
//!
//! Loads configuration from `~/.handoff/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use handoff_core::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.handoff/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (overridden by `HANDOFF_API_KEY` / `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per completion, if the endpoint should be told
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Role the user talks to
    #[serde(default = "default_root_role")]
    pub root_role: String,

    /// Directory every filesystem tool is confined to (default: cwd)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Turn and delegation limits
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Filesystem tool behavior
    #[serde(default)]
    pub tools: ToolsConfig,

    /// User-defined roles; these replace built-ins with the same name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_root_role() -> String {
    "cto".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("root_role", &self.root_role)
            .field("workspace_root", &self.workspace_root)
            .field("runner", &self.runner)
            .field("tools", &self.tools)
            .field("roles", &self.roles.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Completions requested per turn before the tool loop stops
    #[serde(default = "default_max_chat_completions")]
    pub max_chat_completions: u32,

    /// Run the tool calls of one completion concurrently
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,

    /// Refuse delegations below this depth (unset = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delegation_depth: Option<u32>,

    /// Buffered events per Runner channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_chat_completions() -> u32 {
    10
}
fn default_event_capacity() -> usize {
    1024
}
fn default_true() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_chat_completions: default_max_chat_completions(),
            parallel_tool_calls: true,
            max_delegation_depth: None,
            event_capacity: default_event_capacity(),
        }
    }
}

/// What `writeFile` does when the target already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Leave the file alone and tell the model it exists
    #[default]
    RejectExisting,
    /// Replace the file contents
    Overwrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub write_policy: WritePolicy,

    /// Minimum similarity (0.0–1.0) for `modifyFile` to accept a match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Skip files matched by `.gitignore` and friends when listing
    #[serde(default = "default_true")]
    pub respect_ignore_files: bool,
}

fn default_fuzzy_threshold() -> f64 {
    0.95
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            write_policy: WritePolicy::default(),
            fuzzy_threshold: default_fuzzy_threshold(),
            respect_ignore_files: true,
        }
    }
}

/// A role: the recipe a Runner is built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    pub system_prompt: String,

    /// Leaf tool names available to the role
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub delegations: Vec<DelegationConfig>,
}

/// A delegation tool exposed by a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    pub tool_name: String,
    pub description: String,
    /// Description of the `taskDescription` parameter shown to the model
    pub task_description: String,
    /// Role that handles the delegated task
    pub role: String,
}

impl AppConfig {
    /// Load configuration from the default path (~/.handoff/config.toml)
    /// and apply environment overrides:
    /// - `HANDOFF_API_KEY`, then `OPENAI_API_KEY`
    /// - `HANDOFF_MODEL`
    /// - `HANDOFF_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("HANDOFF_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("HANDOFF_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("HANDOFF_API_URL") {
            self.api_url = url;
        }
    }

    /// Resolve credentials: the configured key, else `~/.openai/credentials`.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(Credentials::new(key));
        }

        let path = dirs_home().join(".openai").join("credentials");
        if let Ok(content) = std::fs::read_to_string(&path)
            && let Some(key) = parse_credentials_file(&content)
        {
            tracing::debug!(path = %path.display(), "Loaded API key from credentials file");
            return Ok(Credentials::new(key));
        }

        Err(ConfigError::MissingCredentials {
            config_path: Self::config_dir().join("config.toml"),
            credentials_path: path,
        })
    }

    /// The directory filesystem tools are confined to.
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".handoff")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.tools.fuzzy_threshold) {
            return Err(ConfigError::ValidationError(
                "tools.fuzzy_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.runner.max_chat_completions == 0 {
            return Err(ConfigError::ValidationError(
                "runner.max_chat_completions must be at least 1".into(),
            ));
        }

        if self.runner.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "runner.event_capacity must be at least 1".into(),
            ));
        }

        for (name, role) in &self.roles {
            if role.system_prompt.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "role '{name}' has an empty system_prompt"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            root_role: default_root_role(),
            workspace_root: None,
            runner: RunnerConfig::default(),
            tools: ToolsConfig::default(),
            roles: BTreeMap::new(),
        }
    }
}

/// Extract the key from the first `OPENAI_API_KEY=` line.
pub fn parse_credentials_file(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("OPENAI_API_KEY="))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error(
        "No API key found. Set HANDOFF_API_KEY or OPENAI_API_KEY, add api_key to {config_path}, \
         or add an OPENAI_API_KEY= line to {credentials_path}"
    )]
    MissingCredentials {
        config_path: PathBuf,
        credentials_path: PathBuf,
    },
}
