//! Mock implementations for testing
//!
//! [`MockLlmProvider`] stands in for a hosted model behind
//! [`LlmAgent`](crate::crew::LlmAgent); [`ScriptedGenerator`] replaces the
//! whole agent capability so pipelines can run without any LLM.

use crate::crew::agent::{GenerationError, GenerationRequest, TextGenerator};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock LLM provider for testing
#[derive(Debug)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    /// Cycle through `responses`, one per call
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            current_response: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Requests received so far, in call order
    pub async fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let content = match self.responses.len() {
            0 => "Mock response".to_string(),
            len => self.responses[*current % len].clone(),
        };
        *current += 1;

        Ok(CompletionResponse {
            content: Some(content),
            model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// One generation request as seen by a [`ScriptedGenerator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub prompt: String,
    pub expected_output: String,
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Fail(String),
}

/// Deterministic [`TextGenerator`] stub
///
/// Scripted outcomes are consumed in order. Once the script is exhausted it
/// echoes `[<role>] <prompt>`, so every call still produces output.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.script.get_mut().push_back(Scripted::Respond(text.into()));
        self
    }

    /// Queue a generation failure
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.script.get_mut().push_back(Scripted::Fail(message.into()));
        self
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fallback output for an exhausted script (pure function)
    pub fn echo(request: &GenerationRequest<'_>) -> String {
        format!("[{}] {}", request.role, request.prompt)
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        self.calls.lock().await.push(RecordedCall {
            role: request.role.to_string(),
            goal: request.goal.to_string(),
            backstory: request.backstory.to_string(),
            prompt: request.prompt.to_string(),
            expected_output: request.expected_output.to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.script.lock().await.pop_front() {
            Some(Scripted::Respond(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(GenerationError::Failed(message)),
            None => Ok(Self::echo(request)),
        }
    }
}
