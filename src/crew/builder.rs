//! Wiring from a [`CrewConfig`] to a runnable [`PipelineOrchestrator`]
//!
//! Construction logic lives here, away from the pipeline itself: the
//! provider factory reads credentials, each agent definition becomes an
//! [`LlmAgent`], and each task definition becomes a [`TaskSpec`].

use crate::config::{AgentDefinition, CrewConfig, TaskDefinition};
use crate::crew::agent::{AgentProfile, LlmAgent, TextGenerator};
use crate::crew::executor::TaskExecutor;
use crate::crew::orchestrator::PipelineOrchestrator;
use crate::crew::task::TaskSpec;
use crate::error::{CrewError, CrewResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Create the configured LLM provider, reading the API key from the environment
pub fn create_provider(config: &CrewConfig) -> CrewResult<Arc<dyn LlmProvider>> {
    let api_key = config.get_llm_api_key()?;
    let base_url = config.llm.base_url.clone();

    let provider: Arc<dyn LlmProvider> = match config.llm.provider.as_str() {
        "anthropic" => {
            let defaults = AnthropicConfig::default();
            Arc::new(AnthropicProvider::new(AnthropicConfig {
                api_key,
                base_url: base_url.unwrap_or(defaults.base_url),
                model: config.llm.model.clone(),
                ..defaults
            })?)
        }
        "openai" => {
            let defaults = OpenAiConfig::default();
            Arc::new(OpenAiProvider::new(OpenAiConfig {
                api_key,
                base_url: base_url.unwrap_or(defaults.base_url),
                ..defaults
            })?)
        }
        other => {
            return Err(CrewError::definition(format!(
                "unsupported LLM provider '{other}'"
            )))
        }
    };

    info!(provider = provider.name(), model = %config.llm.model, "LLM provider ready");
    Ok(provider)
}

/// LLM-backed generator for one agent, applying per-agent overrides (pure function)
pub fn llm_agent(
    config: &CrewConfig,
    agent: &AgentDefinition,
    provider: Arc<dyn LlmProvider>,
) -> LlmAgent {
    let model = agent.model.as_deref().unwrap_or(&config.llm.model);
    LlmAgent::new(provider, model)
        .with_temperature(agent.temperature.or(config.llm.temperature))
        .with_max_tokens(config.llm.max_tokens)
}

/// Convert a task definition into a pipeline stage descriptor (pure function)
pub fn task_spec(task: &TaskDefinition) -> TaskSpec {
    TaskSpec {
        id: task.id.clone(),
        description: task.description.clone(),
        expected_output: task.expected_output.clone(),
        agent: task.agent.clone(),
        depends_on: task.depends_on.clone(),
        output_file: task.output_file.clone(),
        timeout: task.timeout_secs.map(Duration::from_secs),
    }
}

/// Build a pipeline whose agents all talk to `provider`
pub fn build_pipeline(
    config: &CrewConfig,
    provider: Arc<dyn LlmProvider>,
) -> CrewResult<PipelineOrchestrator> {
    build_pipeline_with(config, |agent| {
        Arc::new(llm_agent(config, agent, Arc::clone(&provider)))
    })
}

/// Build a pipeline with a caller-chosen generator per agent
pub fn build_pipeline_with<F>(config: &CrewConfig, mut generator_for: F) -> CrewResult<PipelineOrchestrator>
where
    F: FnMut(&AgentDefinition) -> Arc<dyn TextGenerator>,
{
    let agents = config
        .agents
        .iter()
        .map(|agent| {
            AgentProfile::new(
                agent.id.clone(),
                agent.role.clone(),
                agent.goal.clone(),
                agent.backstory.clone(),
                generator_for(agent),
            )
        })
        .collect();
    let tasks = config.tasks.iter().map(task_spec).collect();

    let executor = TaskExecutor::new().with_default_timeout(config.task_timeout());
    Ok(PipelineOrchestrator::new(agents, tasks)?.with_executor(executor))
}
