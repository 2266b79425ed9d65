//! Configuration loading, validation, and management for AgentFlow.
//!
//! Loads configuration from `~/.agentflow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentflow/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the agent that receives requests. Defaults to the first
    /// entry in `agents`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_agent: Option<String>,

    /// Engine-wide defaults
    #[serde(default)]
    pub engine: EngineConfig,

    /// Conversation memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Input/output guardrails
    #[serde(default)]
    pub guardrails: GuardrailConfig,

    /// Agent definitions
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default model name passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Tool-enabled provider calls before the forced final answer
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Whether tool-using requests go through an approval-gated plan
    #[serde(default = "default_true")]
    pub require_plan_approval: bool,

    /// Capacity of the streaming event channel
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Whether per-run usage is tracked in detail
    #[serde(default = "default_true")]
    pub detailed_usage: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "default".into()
}
fn default_max_iterations() -> usize {
    2
}
fn default_stream_buffer() -> usize {
    100
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_iterations: default_max_iterations(),
            require_plan_approval: true,
            stream_buffer: default_stream_buffer(),
            detailed_usage: true,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Keep only this many recent messages. 0 keeps everything.
    #[serde(default)]
    pub max_messages: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Phrases that block a request or a response (case-insensitive)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_phrases: Vec<String>,
}

/// One agent in the delegation tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub system_prompt: String,

    /// Names of built-in tools
    #[serde(default)]
    pub tools: Vec<String>,

    /// Names of other agents exposed to this one as `<name>_agent` tools
    #[serde(default)]
    pub sub_agents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_plan_approval: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentConfig {
    /// An agent with only a name and system prompt.
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            sub_agents: Vec::new(),
            max_iterations: None,
            require_plan_approval: None,
            model: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentflow/config.toml).
    ///
    /// Environment variables override the file:
    /// - `AGENTFLOW_MODEL`
    /// - `AGENTFLOW_MAX_ITERATIONS`
    /// - `AGENTFLOW_REQUIRE_APPROVAL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(model) = lookup("AGENTFLOW_MODEL") {
            self.engine.model = model;
        }
        if let Some(raw) = lookup("AGENTFLOW_MAX_ITERATIONS") {
            self.engine.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("AGENTFLOW_MAX_ITERATIONS is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("AGENTFLOW_REQUIRE_APPROVAL") {
            self.engine.require_plan_approval = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "AGENTFLOW_REQUIRE_APPROVAL must be a boolean: {raw}"
                    )));
                }
            };
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.temperature < 0.0 || self.engine.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "engine.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.engine.stream_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "engine.stream_buffer must be > 0".into(),
            ));
        }

        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::ValidationError("agent name must not be empty".into()));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }

        for agent in &self.agents {
            if let Some(missing) = agent.sub_agents.iter().find(|s| !names.contains(s.as_str())) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' references unknown sub-agent '{missing}'",
                    agent.name
                )));
            }
        }

        if let Some(root) = &self.root_agent {
            if !names.contains(root.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "root_agent '{root}' is not defined"
                )));
            }
        }

        Ok(())
    }

    /// Look up an agent definition by name.
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// The entry agent: `root_agent` if set, otherwise the first agent.
    pub fn root(&self) -> Option<&AgentConfig> {
        match &self.root_agent {
            Some(name) => self.agent(name),
            None => self.agents.first(),
        }
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut assistant = AgentConfig::new(
            "assistant",
            "You are a helpful assistant. Use the calculator for arithmetic.",
        );
        assistant.description = "General-purpose assistant".into();
        assistant.tools = vec!["calculator".into()];
        Self {
            root_agent: Some("assistant".into()),
            engine: EngineConfig::default(),
            memory: MemoryConfig::default(),
            guardrails: GuardrailConfig::default(),
            agents: vec![assistant],
        }
    }
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
}
