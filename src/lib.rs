//! geo-crew
//!
//! A sequential multi-agent task pipeline. Role-bound LLM agents run a fixed
//! list of templated tasks in order, each task seeing the outputs of the
//! tasks before it. The built-in crew turns a project brief and a site data
//! summary into a preliminary geotechnical assessment report.
//!
//! # Overview
//!
//! - [`crew`]: agents, tasks, prompt templates and the pipeline orchestrator
//! - [`config`]: TOML crew definitions, including the built-in geo crew
//! - [`llm`]: provider abstraction with Anthropic and OpenAI backends
//! - [`observability`]: structured logging and run metrics
//! - [`testing`]: mock providers and scripted generators
//!
//! # Quick Start
//!
//! ```no_run
//! use geo_crew::config::CrewConfig;
//! use geo_crew::crew::{build_pipeline, create_provider};
//! use geo_crew::crew::template::vars;
//!
//! # async fn demo() -> geo_crew::CrewResult<()> {
//! let config = CrewConfig::geo_assessment()?;
//! let provider = create_provider(&config)?;
//! let mut pipeline = build_pipeline(&config, provider)?;
//!
//! let run = pipeline
//!     .run(vars([
//!         ("project_brief", "Single-story warehouse, Trondheim"),
//!         ("site_data_summary", "BH-01: fill over medium dense sand"),
//!     ]))
//!     .await;
//! println!("{}", run.into_result()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crew;
pub mod error;
pub mod llm;
pub mod observability;
pub mod testing;

pub use config::{ConfigError, CrewConfig};
pub use crew::{
    AgentProfile, PipelineOrchestrator, PipelineRun, PipelineState, PromptResolver, RunContext,
    TaskExecutor, TaskResult, TaskSpec,
};
pub use error::{CrewError, CrewResult};
