//! Sequential pipeline orchestrator
//!
//! Owns the declared task sequence and drives one run at a time:
//! seed the [`RunContext`] with the caller's inputs, then for each task in
//! declared order resolve its templates, execute it, and record
//! `<task_id>.output`. The first task that fails stops the run.
//!
//! The definition is validated once, at construction. Any dangling, self
//! or forward reference (in `depends_on` or in a `{<task>.output}`
//! placeholder) is a [`CrewError::Definition`], so a run never starts on a
//! malformed pipeline.

use crate::crew::agent::AgentProfile;
use crate::crew::context::{output_key, task_id_of_output_key, RunContext};
use crate::crew::executor::{ResolvedTask, TaskExecutor};
use crate::crew::result::{
    FileWriteStatus, PipelineRun, RunStatus, TaskErrorKind, TaskFailure, TaskResult,
};
use crate::crew::task::TaskSpec;
use crate::crew::template::PromptResolver;
use crate::error::{CrewError, CrewResult};
use crate::observability::metrics::metrics;
use crate::{run_span, task_span};
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Lifecycle of the orchestrator's most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Constructed, no run started
    Idle,
    Running,
    Completed,
    Failed,
}

/// A task paired with the agent that executes it
#[derive(Debug, Clone)]
struct Stage {
    task: TaskSpec,
    agent: AgentProfile,
}

/// Runs a fixed, validated sequence of tasks
#[derive(Debug)]
pub struct PipelineOrchestrator {
    stages: Vec<Stage>,
    resolver: PromptResolver,
    executor: TaskExecutor,
    state: PipelineState,
}

impl PipelineOrchestrator {
    /// Build a pipeline from agent profiles and tasks in execution order
    pub fn new(agents: Vec<AgentProfile>, tasks: Vec<TaskSpec>) -> CrewResult<Self> {
        let resolver = PromptResolver::new();
        validate_definition(&resolver, &agents, &tasks)?;

        let agents: HashMap<String, AgentProfile> = agents
            .into_iter()
            .map(|agent| (agent.id().to_string(), agent))
            .collect();

        let stages = tasks
            .into_iter()
            .map(|task| {
                let agent = agents.get(&task.agent).cloned().ok_or_else(|| {
                    CrewError::definition(format!(
                        "task '{}' is bound to unknown agent '{}'",
                        task.id, task.agent
                    ))
                })?;
                Ok(Stage { task, agent })
            })
            .collect::<CrewResult<Vec<_>>>()?;

        info!(tasks = stages.len(), "Pipeline definition validated");

        Ok(Self {
            stages,
            resolver,
            executor: TaskExecutor::new(),
            state: PipelineState::Idle,
        })
    }

    /// Replace the task executor (e.g. to set a default timeout)
    pub fn with_executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Task ids in execution order
    pub fn task_order(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.task.id.as_str()).collect()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.stages.iter().map(|s| &s.task)
    }

    pub fn agent_for(&self, task_id: &str) -> Option<&AgentProfile> {
        self.stages
            .iter()
            .find(|s| s.task.id == task_id)
            .map(|s| &s.agent)
    }

    /// Execute every task in declared order, stopping at the first failure
    pub async fn run(&mut self, inputs: HashMap<String, String>) -> PipelineRun {
        let run_id = Uuid::new_v4();
        let span = run_span!(run_id = %run_id, tasks = self.stages.len());

        self.state = PipelineState::Running;
        metrics().run_started();

        let run = self.run_stages(run_id, inputs).instrument(span).await;

        self.state = match run.status {
            RunStatus::Completed { .. } => {
                metrics().run_completed();
                PipelineState::Completed
            }
            RunStatus::Failed { .. } => {
                metrics().run_failed();
                PipelineState::Failed
            }
        };

        run
    }

    async fn run_stages(&self, run_id: Uuid, inputs: HashMap<String, String>) -> PipelineRun {
        let started_at = Utc::now();
        let mut context = RunContext::seeded(inputs);
        let mut results: Vec<TaskResult> = Vec::with_capacity(self.stages.len());
        let mut final_output = String::new();

        info!(inputs = context.len(), "Pipeline run started");

        if let Some(task_id) = self.shadowed_output(&context) {
            let message = format!(
                "run input '{}' is reserved for the output of task '{task_id}'",
                output_key(&task_id)
            );
            error!(task_id = %task_id, error = %message, "Rejecting run inputs");
            let status = RunStatus::Failed {
                task_id,
                kind: TaskErrorKind::ConflictingInput,
                message,
            };
            return Self::finish(run_id, status, results, context, started_at);
        }

        for (index, stage) in self.stages.iter().enumerate() {
            let task = &stage.task;
            let span = task_span!(task_id = %task.id, agent = %stage.agent.id(), index);

            let result = self
                .run_stage(stage, &context)
                .instrument(span)
                .await;

            let outcome = Self::classify(&result).map(str::to_string);
            match outcome {
                Ok(output) => {
                    context.record_output(&task.id, &output);
                    final_output = output;
                    metrics().task_completed();
                    results.push(result);
                }
                Err(failure) => {
                    metrics().task_failed();
                    error!(
                        task_id = %task.id,
                        kind = ?failure.kind,
                        error = %failure.message,
                        skipped = self.stages.len() - index - 1,
                        "Task failed, stopping pipeline"
                    );
                    let status = RunStatus::Failed {
                        task_id: task.id.clone(),
                        kind: failure.kind,
                        message: failure.message,
                    };
                    results.push(result);
                    return Self::finish(run_id, status, results, context, started_at);
                }
            }
        }

        info!(tasks = results.len(), "Pipeline run completed");
        let status = RunStatus::Completed {
            output: final_output,
        };
        Self::finish(run_id, status, results, context, started_at)
    }

    async fn run_stage(&self, stage: &Stage, context: &RunContext) -> TaskResult {
        let task = &stage.task;
        info!("Task started");

        let resolved = match ResolvedTask::resolve(&self.resolver, task, context.variables()) {
            Ok(resolved) => resolved,
            Err(e) => return Self::unresolved_result(stage, e.to_string()),
        };

        let result = self.executor.execute(task, &stage.agent, resolved).await;

        if let FileWriteStatus::Failed { path, error } = &result.file_write {
            warn!(path = %path.display(), error = %error, "Output file not written; continuing");
        }
        if result.succeeded() {
            info!(duration_ms = result.duration().as_millis() as u64, "Task completed");
        }

        result
    }

    /// First declared task whose output variable is already set by the inputs
    fn shadowed_output(&self, context: &RunContext) -> Option<String> {
        self.stages
            .iter()
            .map(|stage| &stage.task.id)
            .find(|task_id| context.contains(&output_key(task_id)))
            .cloned()
    }

    /// Output text of a successful task, or the failure that ends the run (pure function)
    fn classify(result: &TaskResult) -> Result<&str, TaskFailure> {
        match (&result.error, &result.output) {
            (None, Some(output)) => Ok(output.as_str()),
            (Some(failure), _) => Err(failure.clone()),
            (None, None) => Err(TaskFailure {
                kind: TaskErrorKind::Generation,
                message: "agent produced no output".to_string(),
            }),
        }
    }

    fn unresolved_result(stage: &Stage, message: String) -> TaskResult {
        let now = Utc::now();
        TaskResult {
            task_id: stage.task.id.clone(),
            agent_id: stage.agent.id().to_string(),
            prompt: None,
            output: None,
            file_write: FileWriteStatus::NotRequested,
            error: Some(TaskFailure {
                kind: TaskErrorKind::UnresolvedVariable,
                message,
            }),
            started_at: now,
            finished_at: now,
        }
    }

    fn finish(
        run_id: Uuid,
        status: RunStatus,
        results: Vec<TaskResult>,
        context: RunContext,
        started_at: chrono::DateTime<Utc>,
    ) -> PipelineRun {
        PipelineRun {
            run_id,
            status,
            results,
            context,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Check a pipeline definition before any run can start
pub fn validate_definition(
    resolver: &PromptResolver,
    agents: &[AgentProfile],
    tasks: &[TaskSpec],
) -> CrewResult<()> {
    if tasks.is_empty() {
        return Err(CrewError::definition("pipeline has no tasks"));
    }

    let mut agent_ids = HashSet::new();
    for agent in agents {
        if agent.id().trim().is_empty() {
            return Err(CrewError::definition("agent id must not be empty"));
        }
        if !agent_ids.insert(agent.id()) {
            return Err(CrewError::definition(format!(
                "duplicate agent id '{}'",
                agent.id()
            )));
        }
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, task) in tasks.iter().enumerate() {
        if task.id.trim().is_empty() {
            return Err(CrewError::definition(format!(
                "task at position {index} has an empty id"
            )));
        }
        if positions.insert(task.id.as_str(), index).is_some() {
            return Err(CrewError::definition(format!(
                "duplicate task id '{}'",
                task.id
            )));
        }
    }

    for (index, task) in tasks.iter().enumerate() {
        if !agent_ids.contains(task.agent.as_str()) {
            return Err(CrewError::definition(format!(
                "task '{}' is bound to unknown agent '{}'",
                task.id, task.agent
            )));
        }

        for dependency in &task.depends_on {
            check_reference(task, index, dependency, &positions, "depends on")?;
        }

        for template in task_templates(task) {
            let names = resolver.placeholders(template).map_err(|e| {
                CrewError::definition(format!("task '{}' has a malformed template: {e}", task.id))
            })?;
            for name in &names {
                if let Some(referenced) = task_id_of_output_key(name) {
                    check_reference(task, index, referenced, &positions, "references output of")?;
                }
            }
        }
    }

    Ok(())
}

fn task_templates(task: &TaskSpec) -> impl Iterator<Item = &str> {
    [Some(task.description.as_str()), Some(task.expected_output.as_str()), task.output_file.as_deref()]
        .into_iter()
        .flatten()
}

/// A task may only reference tasks strictly before it in declared order
fn check_reference(
    task: &TaskSpec,
    index: usize,
    referenced: &str,
    positions: &HashMap<&str, usize>,
    relation: &str,
) -> CrewResult<()> {
    match positions.get(referenced) {
        None => Err(CrewError::definition(format!(
            "task '{}' {relation} unknown task '{referenced}'",
            task.id
        ))),
        Some(&position) if position == index => Err(CrewError::definition(format!(
            "task '{}' {relation} itself",
            task.id
        ))),
        Some(&position) if position > index => Err(CrewError::definition(format!(
            "task '{}' {relation} task '{referenced}', which runs after it",
            task.id
        ))),
        Some(_) => Ok(()),
    }
}
