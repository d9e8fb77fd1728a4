//! Agent profiles and the text-generation capability boundary
//!
//! An [`AgentProfile`] is a static role descriptor (role, goal, backstory)
//! bound to a [`TextGenerator`]. The orchestrator only ever talks to agents
//! through [`TextGenerator::generate`], so tests can substitute a
//! deterministic stub for a live LLM service.

use crate::llm::provider::{CompletionRequest, LlmError, LlmProvider, Message, MessageRole};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Everything an agent capability receives for one generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest<'a> {
    pub role: &'a str,
    pub goal: &'a str,
    pub backstory: &'a str,
    /// Fully resolved task prompt
    pub prompt: &'a str,
    /// Resolved description of the desired output; advisory framing only
    pub expected_output: &'a str,
}

/// Failures of a text-generation capability
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Failed(String),

    #[error("agent returned empty output")]
    EmptyOutput,

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<LlmError> for GenerationError {
    fn from(error: LlmError) -> Self {
        GenerationError::Failed(error.to_string())
    }
}

/// Text-generation capability behind an agent
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce the agent's answer for a resolved task prompt
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// A role-bound text-generation capability
///
/// Immutable after construction. One profile may serve several tasks.
#[derive(Clone)]
pub struct AgentProfile {
    id: String,
    role: String,
    goal: String,
    backstory: String,
    generator: Arc<dyn TextGenerator>,
}

impl AgentProfile {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            generator,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    /// Build the generation request for a resolved prompt
    pub fn request<'a>(&'a self, prompt: &'a str, expected_output: &'a str) -> GenerationRequest<'a> {
        GenerationRequest {
            role: &self.role,
            goal: &self.goal,
            backstory: &self.backstory,
            prompt,
            expected_output,
        }
    }

    /// Invoke the bound capability
    pub async fn generate(
        &self,
        prompt: &str,
        expected_output: &str,
    ) -> Result<String, GenerationError> {
        self.generator
            .generate(&self.request(prompt, expected_output))
            .await
    }
}

impl fmt::Debug for AgentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentProfile")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("goal", &self.goal)
            .finish_non_exhaustive()
    }
}

/// [`TextGenerator`] backed by an [`LlmProvider`]
pub struct LlmAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Persona framing sent as the system message (pure function)
    pub fn system_prompt(request: &GenerationRequest<'_>) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            request.role.trim(),
            request.backstory.trim(),
            request.goal.trim()
        )
    }

    /// Task prompt followed by the expected-output guidance (pure function)
    pub fn user_prompt(request: &GenerationRequest<'_>) -> String {
        let prompt = request.prompt.trim();
        let expected = request.expected_output.trim();
        if expected.is_empty() {
            return prompt.to_string();
        }
        format!(
            "{prompt}\n\nThis is the expected criteria for your final answer: {expected}\n\
             Return the complete content as your final answer, not a summary of it."
        )
    }

    fn build_request(&self, request: &GenerationRequest<'_>) -> CompletionRequest {
        let mut metadata = HashMap::new();
        metadata.insert("agent_role".to_string(), request.role.to_string());

        CompletionRequest {
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: Self::system_prompt(request),
                },
                Message {
                    role: MessageRole::User,
                    content: Self::user_prompt(request),
                },
            ],
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: None,
            stop_sequences: None,
            metadata,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmAgent {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let response = self.provider.complete(self.build_request(request)).await?;

        debug!(
            provider = self.provider.name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = ?response.finish_reason,
            "LLM generation finished"
        );

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(GenerationError::EmptyOutput),
        }
    }
}
