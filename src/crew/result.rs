//! Task and run outcomes
//!
//! A [`TaskResult`] is created once per task execution and never mutated
//! afterwards. A [`PipelineRun`] is the audit trail of one `run()`: the
//! ordered task results, the final variable map and the terminal status.

use crate::crew::context::RunContext;
use crate::error::CrewError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Category of a task failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    UnresolvedVariable,
    Generation,
    Timeout,
    /// A run input is named like a declared task's output
    ConflictingInput,
}

/// Why a task did not produce output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: TaskErrorKind,
    pub message: String,
}

/// Outcome of persisting a task's output to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileWriteStatus {
    /// The task declares no output file
    NotRequested,
    Written { path: PathBuf },
    Failed { path: PathBuf, error: String },
}

/// Record of one task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: String,
    /// Prompt actually sent to the agent; `None` if resolution failed
    pub prompt: Option<String>,
    pub output: Option<String>,
    pub file_write: FileWriteStatus,
    pub error: Option<TaskFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// Whether the agent produced output
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.output.is_some()
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        match &self.file_write {
            FileWriteStatus::Written { path } => Some(path),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task generated output; `output` is the last task's text
    Completed { output: String },
    /// The named task failed and no later task ran
    Failed {
        task_id: String,
        kind: TaskErrorKind,
        message: String,
    },
}

/// Audit trail of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// One entry per executed task, in execution order
    pub results: Vec<TaskResult>,
    pub context: RunContext,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed { .. })
    }

    /// Final task output for a completed run
    pub fn output(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Completed { output } => Some(output),
            RunStatus::Failed { .. } => None,
        }
    }

    pub fn failed_task(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Failed { task_id, .. } => Some(task_id),
            RunStatus::Completed { .. } => None,
        }
    }

    pub fn result_for(&self, task_id: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task_id == task_id)
    }

    /// File written by the last task, if any
    pub fn report_path(&self) -> Option<&PathBuf> {
        self.results.last().and_then(TaskResult::output_path)
    }

    /// Collapse the run into the final output or the error that stopped it
    pub fn into_result(self) -> Result<String, CrewError> {
        match self.status {
            RunStatus::Completed { output } => Ok(output),
            RunStatus::Failed {
                task_id,
                kind,
                message,
            } => Err(match kind {
                TaskErrorKind::UnresolvedVariable => CrewError::UnresolvedVariable {
                    task_id,
                    message,
                },
                TaskErrorKind::Generation => CrewError::Generation { task_id, message },
                TaskErrorKind::Timeout => CrewError::Timeout { task_id, message },
                TaskErrorKind::ConflictingInput => CrewError::ConflictingInput { task_id, message },
            }),
        }
    }
}
