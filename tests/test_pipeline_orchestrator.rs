//! Integration tests for the pipeline orchestrator
//!
//! Covers the behavioral contracts of a run:
//! - outputs flow to later tasks through `{<task_id>.output}`
//! - the first failing task stops the run
//! - malformed definitions are rejected before any run
//! - output files are written without affecting the run outcome


use geo_crew::config::CrewConfig;
use geo_crew::crew::template::vars;
use geo_crew::crew::{
    build_pipeline_with, FileWriteStatus, PipelineOrchestrator, PipelineState, RunStatus,
    TaskErrorKind, TaskExecutor, TaskSpec,
};
use geo_crew::testing::ScriptedGenerator;
use geo_crew::CrewError;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_helpers::scripted_agent;

#[tokio::test]
async fn test_two_task_chain_passes_output_forward() {
    let (analyst, analyst_calls) = scripted_agent("A", ScriptedGenerator::new().with_response("S1"));
    let (reviewer, reviewer_calls) = scripted_agent("B", ScriptedGenerator::new().with_response("S2"));

    let mut pipeline = PipelineOrchestrator::new(
        vec![analyst, reviewer],
        vec![
            TaskSpec::new("task1", "A", "Summarize: {brief}", "summary"),
            TaskSpec::new("task2", "B", "Review: {task1.output}", "review").depends_on(["task1"]),
        ],
    )
    .unwrap();

    let run = pipeline.run(vars([("brief", "X")])).await;

    assert_eq!(run.output(), Some("S2"));
    assert_eq!(pipeline.state(), PipelineState::Completed);
    assert_eq!(analyst_calls.calls().await[0].prompt, "Summarize: X");
    assert_eq!(reviewer_calls.calls().await[0].prompt, "Review: S1");

    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[0].prompt.as_deref(), Some("Summarize: X"));
    assert_eq!(run.results[1].output.as_deref(), Some("S2"));
    assert_eq!(run.context.get("brief"), Some("X"));
    assert_eq!(run.context.output_of("task1"), Some("S1"));
    assert_eq!(run.context.output_of("task2"), Some("S2"));
}

#[tokio::test]
async fn test_input_cannot_stand_in_for_task_output() {
    let (analyst, analyst_calls) = scripted_agent("A", ScriptedGenerator::new().with_response("X-summary"));
    let (reviewer, reviewer_calls) = scripted_agent("B", ScriptedGenerator::new());

    let mut pipeline = PipelineOrchestrator::new(
        vec![analyst, reviewer],
        vec![
            TaskSpec::new("task1", "A", "Summarize: {brief}", "summary"),
            TaskSpec::new("task2", "B", "Expand: {task1.output}", "report").depends_on(["task1"]),
        ],
    )
    .unwrap();

    let run = pipeline
        .run(vars([("brief", "X"), ("task1.output", "INJECTED")]))
        .await;

    assert!(!run.is_completed());
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(run.failed_task(), Some("task1"));
    assert!(run.results.is_empty());
    assert_eq!(analyst_calls.call_count().await, 0);
    assert_eq!(reviewer_calls.call_count().await, 0);

    match run.into_result() {
        Err(CrewError::ConflictingInput { task_id, message }) => {
            assert_eq!(task_id, "task1");
            assert!(message.contains("task1.output"));
        }
        other => panic!("expected conflicting input error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_task_stops_the_run() {
    let (first, _) = scripted_agent("first", ScriptedGenerator::new().with_response("ok"));
    let (second, _) = scripted_agent("second", ScriptedGenerator::new().with_failure("model overloaded"));
    let (third, third_calls) = scripted_agent("third", ScriptedGenerator::new());

    let mut pipeline = PipelineOrchestrator::new(
        vec![first, second, third],
        vec![
            TaskSpec::new("t1", "first", "go", "e"),
            TaskSpec::new("t2", "second", "{t1.output}", "e"),
            TaskSpec::new("t3", "third", "{t2.output}", "e"),
        ],
    )
    .unwrap();

    let run = pipeline.run(HashMap::new()).await;

    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(run.failed_task(), Some("t2"));
    assert_eq!(run.results.len(), 2);
    assert!(run.result_for("t3").is_none());
    assert_eq!(third_calls.call_count().await, 0);
    assert!(run.context.output_of("t2").is_none());

    match run.into_result() {
        Err(CrewError::Generation { task_id, message }) => {
            assert_eq!(task_id, "t2");
            assert!(message.contains("model overloaded"));
        }
        other => panic!("expected generation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unresolved_variable_never_calls_agent() {
    let (agent, calls) = scripted_agent("a", ScriptedGenerator::new());
    let mut pipeline = PipelineOrchestrator::new(
        vec![agent],
        vec![TaskSpec::new("t1", "a", "Needs {site_data_summary}", "e")],
    )
    .unwrap();

    let run = pipeline.run(vars([("project_brief", "B")])).await;

    assert_eq!(calls.call_count().await, 0);
    match &run.status {
        RunStatus::Failed { kind, message, .. } => {
            assert_eq!(*kind, TaskErrorKind::UnresolvedVariable);
            assert!(message.contains("site_data_summary"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn test_forward_dependency_is_a_definition_error() {
    let (agent, _) = scripted_agent("a", ScriptedGenerator::new());
    let result = PipelineOrchestrator::new(
        vec![agent],
        vec![
            TaskSpec::new("a_task", "a", "d", "e"),
            TaskSpec::new("b_task", "a", "d", "e").depends_on(["c_task"]),
            TaskSpec::new("c_task", "a", "d", "e"),
        ],
    );

    assert!(matches!(result, Err(CrewError::Definition { .. })));
}

#[tokio::test]
async fn test_file_write_failure_does_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let bad_path = blocker.join("report.md");

    let (writer, _) = scripted_agent("w", ScriptedGenerator::new().with_response("# Report"));
    let (after, after_calls) = scripted_agent("after", ScriptedGenerator::new().with_response("done"));

    let mut pipeline = PipelineOrchestrator::new(
        vec![writer, after],
        vec![
            TaskSpec::new("report", "w", "write", "e").with_output_file(bad_path.display().to_string()),
            TaskSpec::new("follow_up", "after", "{report.output}", "e"),
        ],
    )
    .unwrap();

    let run = pipeline.run(HashMap::new()).await;

    assert!(run.is_completed());
    assert!(matches!(run.results[0].file_write, FileWriteStatus::Failed { .. }));
    assert_eq!(run.context.output_of("report"), Some("# Report"));
    assert_eq!(after_calls.calls().await[0].prompt, "# Report");
}

#[tokio::test]
async fn test_output_file_path_is_templated() {
    let dir = TempDir::new().unwrap();
    let template = format!("{}/{{site}}/report.md", dir.path().display());

    let (writer, _) = scripted_agent("w", ScriptedGenerator::new().with_response("# Trondheim"));
    let mut pipeline = PipelineOrchestrator::new(
        vec![writer],
        vec![TaskSpec::new("report", "w", "write about {site}", "e").with_output_file(template)],
    )
    .unwrap();

    let run = pipeline.run(vars([("site", "trondheim")])).await;

    let expected = dir.path().join("trondheim").join("report.md");
    assert_eq!(run.report_path(), Some(&expected));
    assert_eq!(std::fs::read_to_string(expected).unwrap(), "# Trondheim");
}

#[tokio::test]
async fn test_default_timeout_applies_to_every_task() {
    let (slow, _) = scripted_agent(
        "slow",
        ScriptedGenerator::new().with_delay(Duration::from_secs(5)),
    );
    let mut pipeline = PipelineOrchestrator::new(vec![slow], vec![TaskSpec::new("t1", "slow", "d", "e")])
        .unwrap()
        .with_executor(TaskExecutor::new().with_default_timeout(Some(Duration::from_millis(20))));

    let run = pipeline.run(HashMap::new()).await;

    assert!(matches!(
        run.into_result(),
        Err(CrewError::Timeout { ref task_id, .. }) if task_id == "t1"
    ));
}

#[tokio::test]
async fn test_pipeline_can_run_again_with_fresh_context() {
    let (agent, _) = scripted_agent("a", ScriptedGenerator::new());
    let mut pipeline =
        PipelineOrchestrator::new(vec![agent], vec![TaskSpec::new("t1", "a", "{brief}", "e")]).unwrap();

    let first = pipeline.run(vars([("brief", "one")])).await;
    let second = pipeline.run(vars([("brief", "two")])).await;

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.output(), Some("[a role] one"));
    assert_eq!(second.output(), Some("[a role] two"));
    assert_eq!(second.context.len(), 2);
}

#[tokio::test]
async fn test_geo_crew_runs_end_to_end_with_stub_agents() {
    let dir = TempDir::new().unwrap();
    let mut config = CrewConfig::geo_assessment().unwrap();
    let report_path = dir.path().join("preliminary_geo_report.md");
    config.tasks[3].output_file = Some(report_path.display().to_string());

    let mut pipeline =
        build_pipeline_with(&config, |_| Arc::new(ScriptedGenerator::new())).unwrap();
    let run = pipeline
        .run(vars([
            ("project_brief", "Warehouse in Trondheim"),
            ("site_data_summary", "BH-01: sand over clay"),
        ]))
        .await;

    assert!(run.is_completed());
    assert_eq!(run.results.len(), 4);
    assert_eq!(run.report_path(), Some(&report_path));

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.starts_with("[Technical Report Summarizer]"));
    // Upstream outputs are embedded verbatim in the final prompt
    assert!(report.contains("Warehouse in Trondheim"));
    assert!(report.contains("BH-01: sand over clay"));
}

proptest! {
    #[test]
    fn prop_context_wiring_passes_exact_outputs(
        brief in "[a-zA-Z0-9 .,]{0,40}",
        first_output in "[a-zA-Z0-9 {}]{1,40}",
    ) {
        prop_assume!(!first_output.trim().is_empty());

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let (first, _) = scripted_agent("a", ScriptedGenerator::new().with_response(first_output.clone()));
            let (second, calls) = scripted_agent("b", ScriptedGenerator::new());

            let mut pipeline = PipelineOrchestrator::new(
                vec![first, second],
                vec![
                    TaskSpec::new("t1", "a", "{brief}", "e"),
                    TaskSpec::new("t2", "b", "<{t1.output}>", "e"),
                ],
            )
            .unwrap();

            let run = pipeline.run(vars([("brief", brief.as_str())])).await;
            prop_assert!(run.is_completed());
            prop_assert_eq!(run.context.output_of("t1"), Some(first_output.as_str()));
            prop_assert_eq!(calls.calls().await[0].prompt.clone(), format!("<{first_output}>"));
            Ok(())
        })?;
    }
}
