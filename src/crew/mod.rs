//! Sequential multi-agent task pipeline
//!
//! A crew is a fixed list of tasks, each bound to one agent. Tasks run one
//! at a time in declared order; each task's output becomes the variable
//! `<task_id>.output` that later prompts can reference with
//! `{<task_id>.output}`.
//!
//! ```no_run
//! use geo_crew::crew::{AgentProfile, PipelineOrchestrator, TaskSpec};
//! use geo_crew::crew::template::vars;
//! use geo_crew::testing::ScriptedGenerator;
//! use std::sync::Arc;
//!
//! # async fn demo() -> geo_crew::CrewResult<()> {
//! let analyst = AgentProfile::new(
//!     "analyst",
//!     "Project Brief Analyst",
//!     "Extract requirements",
//!     "Senior engineer",
//!     Arc::new(ScriptedGenerator::new()),
//! );
//! let tasks = vec![
//!     TaskSpec::new("extract", "analyst", "Summarize: {project_brief}", "Bullet list"),
//!     TaskSpec::new("review", "analyst", "Check: {extract.output}", "Notes").depends_on(["extract"]),
//! ];
//!
//! let mut pipeline = PipelineOrchestrator::new(vec![analyst], tasks)?;
//! let run = pipeline.run(vars([("project_brief", "Warehouse, Trondheim")])).await;
//! println!("{}", run.into_result()?);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod builder;
pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod result;
pub mod task;
pub mod template;

pub use agent::{AgentProfile, GenerationError, GenerationRequest, LlmAgent, TextGenerator};
pub use builder::{build_pipeline, build_pipeline_with, create_provider};
pub use context::{output_key, RunContext};
pub use executor::{ResolvedTask, TaskExecutor};
pub use orchestrator::{PipelineOrchestrator, PipelineState};
pub use result::{FileWriteStatus, PipelineRun, RunStatus, TaskErrorKind, TaskFailure, TaskResult};
pub use task::TaskSpec;
pub use template::{PromptResolver, TemplateError};
