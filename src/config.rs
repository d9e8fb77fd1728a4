//! Crew configuration loaded from TOML
//!
//! A crew file declares the LLM backend, the agents and the tasks. The order
//! of `[[tasks]]` is the execution order. Load-time validation covers field
//! formats only; whether the tasks form a valid pipeline is checked when the
//! orchestrator is built, so programmatic pipelines get the same checks.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Providers the crate can construct from configuration
pub const SUPPORTED_PROVIDERS: [&str; 2] = ["anthropic", "openai"];

/// Built-in geotechnical assessment crew
const GEO_ASSESSMENT_TOML: &str = include_str!("../config/geo_assessment.toml");

/// Complete crew definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewConfig {
    pub crew: CrewSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

/// Crew metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewSection {
    /// Crew identifier (must match [a-zA-Z0-9._-]+)
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// LLM backend shared by all agents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,
    /// Default model identifier
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Default per-task timeout; absent means unbounded
    pub task_timeout_secs: Option<u64>,
    /// Override the provider endpoint (proxies, compatible gateways)
    pub base_url: Option<String>,
}

/// One `[[agents]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDefinition {
    pub id: String,
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    /// Per-agent model override
    pub model: Option<String>,
    /// Per-agent temperature override
    pub temperature: Option<f32>,
}

/// One `[[tasks]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDefinition {
    pub id: String,
    pub description: String,
    pub expected_output: String,
    pub agent: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub output_file: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CrewConfig {
    /// Load and validate a crew definition from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a crew definition
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CrewConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in four-stage geotechnical assessment crew
    pub fn geo_assessment() -> Result<Self, ConfigError> {
        Self::from_toml_str(GEO_ASSESSMENT_TOML)
    }

    /// Render back to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check field formats
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_id("crew", &self.crew.name)?;

        if !SUPPORTED_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "unknown provider '{}', expected one of {}",
                self.llm.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("llm.model must not be empty".to_string()));
        }
        if self.llm.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "llm.api_key_env must not be empty".to_string(),
            ));
        }
        validate_temperature("llm.temperature", self.llm.temperature)?;
        validate_timeout("llm.task_timeout_secs", self.llm.task_timeout_secs)?;

        for agent in &self.agents {
            validate_id("agent", &agent.id)?;
            validate_temperature(&format!("agents.{}.temperature", agent.id), agent.temperature)?;
        }

        for task in &self.tasks {
            validate_id("task", &task.id)?;
            validate_id("agent", &task.agent)?;
            validate_timeout(&format!("tasks.{}.timeout_secs", task.id), task.timeout_secs)?;
        }

        Ok(())
    }

    /// Default per-task timeout
    pub fn task_timeout(&self) -> Option<Duration> {
        self.llm.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    /// Run input names referenced by the task templates, excluding task outputs
    pub fn input_names(&self) -> std::collections::BTreeSet<String> {
        let resolver = crate::crew::PromptResolver::new();
        self.tasks
            .iter()
            .flat_map(|task| {
                [
                    Some(task.description.as_str()),
                    Some(task.expected_output.as_str()),
                    task.output_file.as_deref(),
                ]
            })
            .flatten()
            .filter_map(|template| resolver.placeholders(template).ok())
            .flatten()
            .filter(|name| crate::crew::context::task_id_of_output_key(name).is_none())
            .collect()
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }
}

/// Identifier format shared by crews, agents and tasks (pure function)
pub fn validate_id(kind: &str, id: &str) -> Result<(), ConfigError> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidId(format!(
            "{kind} id '{id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

fn validate_temperature(field: &str, temperature: Option<f32>) -> Result<(), ConfigError> {
    match temperature {
        Some(t) if !(0.0..=2.0).contains(&t) => Err(ConfigError::InvalidConfig(format!(
            "{field} must be between 0.0 and 2.0, got {t}"
        ))),
        _ => Ok(()),
    }
}

fn validate_timeout(field: &str, secs: Option<u64>) -> Result<(), ConfigError> {
    match secs {
        Some(0) => Err(ConfigError::InvalidConfig(format!("{field} must be positive"))),
        _ => Ok(()),
    }
}
