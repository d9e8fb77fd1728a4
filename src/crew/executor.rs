//! Single-task execution
//!
//! The executor calls the task's agent with an already-resolved prompt,
//! bounds the call with the task's timeout, and mirrors successful output to
//! the task's output file. A failed file write is recorded on the
//! [`TaskResult`] and never turns a successful generation into a failure.

use crate::crew::agent::{AgentProfile, GenerationError};
use crate::crew::result::{FileWriteStatus, TaskErrorKind, TaskFailure, TaskResult};
use crate::crew::task::TaskSpec;
use crate::crew::template::{PromptResolver, TemplateError};
use crate::error::{CrewError, CrewResult};
use crate::observability::metrics::metrics;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A task's templates rendered against the current run context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub prompt: String,
    pub expected_output: String,
    pub output_file: Option<PathBuf>,
}

impl ResolvedTask {
    /// Render prompt, expected output and output path of `task`
    pub fn resolve(
        resolver: &PromptResolver,
        task: &TaskSpec,
        variables: &HashMap<String, String>,
    ) -> Result<Self, TemplateError> {
        let prompt = resolver.resolve(&task.description, variables)?;
        let expected_output = resolver.resolve(&task.expected_output, variables)?;
        let output_file = task
            .output_file
            .as_deref()
            .map(|path| resolver.resolve(path, variables).map(PathBuf::from))
            .transpose()?;

        Ok(Self {
            prompt,
            expected_output,
            output_file,
        })
    }
}

/// Runs one task against its agent
#[derive(Debug, Clone, Default)]
pub struct TaskExecutor {
    default_timeout: Option<Duration>,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout applied to tasks that do not declare their own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn timeout_for(&self, task: &TaskSpec) -> Option<Duration> {
        task.timeout.or(self.default_timeout)
    }

    /// Generate the task's output and persist it if requested
    pub async fn execute(
        &self,
        task: &TaskSpec,
        agent: &AgentProfile,
        resolved: ResolvedTask,
    ) -> TaskResult {
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = self.generate(task, agent, &resolved).await;
        metrics().record_generation_time(clock.elapsed());

        let (output, error, file_write) = match outcome {
            Ok(text) => {
                let file_write = match &resolved.output_file {
                    Some(path) => Self::write_status(&task.id, path, &text).await,
                    None => FileWriteStatus::NotRequested,
                };
                (Some(text), None, file_write)
            }
            Err(error) => {
                let kind = match error {
                    GenerationError::Timeout(_) => TaskErrorKind::Timeout,
                    _ => TaskErrorKind::Generation,
                };
                let failure = TaskFailure {
                    kind,
                    message: error.to_string(),
                };
                (None, Some(failure), FileWriteStatus::NotRequested)
            }
        };

        TaskResult {
            task_id: task.id.clone(),
            agent_id: agent.id().to_string(),
            prompt: Some(resolved.prompt),
            output,
            file_write,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn generate(
        &self,
        task: &TaskSpec,
        agent: &AgentProfile,
        resolved: &ResolvedTask,
    ) -> Result<String, GenerationError> {
        let generation = agent.generate(&resolved.prompt, &resolved.expected_output);

        let text = match self.timeout_for(task) {
            Some(limit) => match tokio::time::timeout(limit, generation).await {
                Ok(result) => result?,
                Err(_) => {
                    metrics().generation_timed_out();
                    return Err(GenerationError::Timeout(limit));
                }
            },
            None => generation.await?,
        };

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyOutput);
        }

        debug!(task_id = %task.id, chars = text.len(), "Agent produced output");
        Ok(text)
    }

    async fn write_status(task_id: &str, path: &Path, text: &str) -> FileWriteStatus {
        match persist_output(task_id, path, text).await {
            Ok(()) => {
                metrics().file_written();
                FileWriteStatus::Written {
                    path: path.to_path_buf(),
                }
            }
            Err(e) => {
                metrics().file_write_failed();
                warn!(task_id = %task_id, path = %path.display(), error = %e, "Failed to write task output file");
                FileWriteStatus::Failed {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Write `text` to `path`, creating parent directories; overwrites existing files
pub async fn persist_output(task_id: &str, path: &Path, text: &str) -> CrewResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CrewError::file_write(task_id, path, e.to_string()))?;
    }

    tokio::fs::write(path, text)
        .await
        .map_err(|e| CrewError::file_write(task_id, path, e.to_string()))
}
