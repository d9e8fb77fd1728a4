//! geo-crew command line entry point

use clap::{Args, Parser, Subcommand};
use geo_crew::config::CrewConfig;
use geo_crew::crew::{
    build_pipeline, build_pipeline_with, create_provider, FileWriteStatus, PipelineRun, RunStatus,
};
use geo_crew::error::sanitize_error_message;
use geo_crew::observability::{init_default_logging, metrics};
use geo_crew::testing::ScriptedGenerator;
use std::collections::HashMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

const PROJECT_BRIEF: &str = "project_brief";
const SITE_DATA_SUMMARY: &str = "site_data_summary";

const DEMO_PROJECT_BRIEF: &str = "\
Project: New Warehouse Construction
Location: Industrial Zone North, Trondheim, Norway
Structure Type: Single-story warehouse, concrete slab-on-grade.
Estimated Foundation Loads: Column loads approx 500 kN. Wall loads approx 50 kN/m.";

const DEMO_SITE_DATA: &str = "\
Borehole BH-01 Log Summary:
Layer 1: 0.0m - 2.0m depth; Fill Material (Sand & Gravel mix); Avg N-value=8
Layer 2: 2.0m - 7.5m depth; Medium Dense Sand; Avg N-value=20; Est. Friction Angle=32 deg
Layer 3: 7.5m - 15.0m depth; Stiff Clay; Avg Su=70 kPa; N > 30
Groundwater observed at 3.0m depth.";

/// Sequential multi-agent geotechnical assessment pipeline
#[derive(Parser)]
#[command(name = "geo-crew")]
#[command(about = "Run a crew of LLM agents that drafts a preliminary geotechnical report")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crew and print the final result
    Run(RunArgs),
    /// Check a crew definition without calling any LLM
    Validate {
        /// Crew definition file (defaults to crew.toml, then the built-in crew)
        #[arg(short, long, value_name = "FILE", env = "GEO_CREW_CONFIG")]
        config: Option<PathBuf>,

        /// Print the normalized definition
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Crew definition file (defaults to crew.toml, then the built-in crew)
    #[arg(short, long, value_name = "FILE", env = "GEO_CREW_CONFIG")]
    config: Option<PathBuf>,

    /// Project brief text
    #[arg(long, conflicts_with = "brief_file")]
    brief: Option<String>,

    /// Read the project brief from a file
    #[arg(long, value_name = "FILE")]
    brief_file: Option<PathBuf>,

    /// Site investigation summary text
    #[arg(long, conflicts_with = "site_data_file")]
    site_data: Option<String>,

    /// Read the site investigation summary from a file
    #[arg(long, value_name = "FILE")]
    site_data_file: Option<PathBuf>,

    /// Extra run input, repeatable
    #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    inputs: Vec<(String, String)>,

    /// Use the sample warehouse brief and borehole log for missing inputs
    #[arg(long)]
    demo: bool,

    /// Print the full run record as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let result = match cli.command {
        Commands::Run(args) => run_crew(args).await,
        Commands::Validate { config, show } => validate_crew(config.as_deref(), show),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            let message = sanitize_error_message(&e.to_string());
            error!("Command failed: {}", message);
            eprintln!("Error: {message}");
            process::exit(1);
        }
    }
}

/// Parse a `KEY=VALUE` run input (pure function)
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_configuration(path: Option<&Path>) -> Result<CrewConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        info!("Loading crew definition from: {}", path.display());
        return Ok(CrewConfig::load_from_file(path)?);
    }

    for candidate in ["crew.toml", "config/crew.toml"] {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading crew definition from: {}", path.display());
            return Ok(CrewConfig::load_from_file(path)?);
        }
    }

    info!("No crew file found, using the built-in geotechnical assessment crew");
    Ok(CrewConfig::geo_assessment()?)
}

async fn run_crew(args: RunArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_configuration(args.config.as_deref())?;

    // Fail before prompting for input if credentials are missing
    if let Err(e) = config.get_llm_api_key() {
        eprintln!(
            "Error: {e}. Set {} before running the crew.",
            config.llm.api_key_env
        );
        return Ok(false);
    }

    let inputs = collect_inputs(&config, &args)?;
    let provider = create_provider(&config)?;
    let mut pipeline = build_pipeline(&config, provider)?;

    info!(crew = %config.crew.name, tasks = config.tasks.len(), "Kicking off crew");
    let run = pipeline.run(inputs).await;
    info!(metrics = ?metrics().snapshot(), "Crew finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(run.is_completed());
    }

    Ok(print_run(&run))
}

/// Gather run inputs from flags, files, demo data and finally stdin
fn collect_inputs(
    config: &CrewConfig,
    args: &RunArgs,
) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    let mut inputs: HashMap<String, String> = args.inputs.iter().cloned().collect();

    if let Some(brief) = read_text(args.brief.as_deref(), args.brief_file.as_deref())? {
        inputs.insert(PROJECT_BRIEF.to_string(), brief);
    }
    if let Some(site) = read_text(args.site_data.as_deref(), args.site_data_file.as_deref())? {
        inputs.insert(SITE_DATA_SUMMARY.to_string(), site);
    }

    for name in config.input_names() {
        if inputs.contains_key(&name) {
            continue;
        }
        let value = match (args.demo, name.as_str()) {
            (true, PROJECT_BRIEF) => DEMO_PROJECT_BRIEF.to_string(),
            (true, SITE_DATA_SUMMARY) => DEMO_SITE_DATA.to_string(),
            _ => prompt_for(&name)?,
        };
        inputs.insert(name, value);
    }

    Ok(inputs)
}

fn read_text(
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    match (inline, file) {
        (Some(text), _) => Ok(Some(text.to_string())),
        (None, Some(path)) => Ok(Some(std::fs::read_to_string(path)?)),
        (None, None) => Ok(None),
    }
}

/// Read a multi-line value from stdin, ending at an empty line or EOF
fn prompt_for(name: &str) -> io::Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprintln!("Enter {} (finish with an empty line):", name.replace('_', " "));
        io::stderr().flush()?;
    }

    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Print the outcome the way a user expects to read it; returns success
fn print_run(run: &PipelineRun) -> bool {
    let output = match run.output() {
        Some(output) => output,
        None => {
            eprintln!("\nCrew run failed.");
            if let RunStatus::Failed {
                task_id,
                kind,
                message,
            } = &run.status
            {
                eprintln!(
                    "  task '{}' ({:?}): {}",
                    task_id,
                    kind,
                    sanitize_error_message(message)
                );
            }
            return false;
        }
    };

    println!("\n########################");
    println!("## Crew Execution Finished");
    println!("########################\n");
    println!("Final Crew Result:");
    println!("{output}");

    let declared = run
        .results
        .last()
        .and_then(|result| match &result.file_write {
            FileWriteStatus::NotRequested => None,
            FileWriteStatus::Written { path } | FileWriteStatus::Failed { path, .. } => {
                Some(path.clone())
            }
        });

    match declared {
        Some(path) if path.exists() => {
            println!("\nReport successfully saved to: {}", path.display());
        }
        Some(path) => {
            warn!(path = %path.display(), "Report file was not created");
            if output.trim_start().starts_with('#') {
                println!("\n--- Final Report Content (from result) ---");
                println!("{output}");
                println!("----------------------------------------");
            } else {
                eprintln!(
                    "\nError: Report file '{}' was not created, and the result does not appear to be the report content.",
                    path.display()
                );
            }
        }
        None => {}
    }

    true
}

fn validate_crew(path: Option<&Path>, show: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_configuration(path)?;
    let pipeline = build_pipeline_with(&config, |_| Arc::new(ScriptedGenerator::new()))?;

    println!(
        "Crew '{}' is valid: {} agents, {} tasks",
        config.crew.name,
        config.agents.len(),
        config.tasks.len()
    );
    println!("Execution order: {}", pipeline.task_order().join(" -> "));

    let inputs: Vec<String> = config.input_names().into_iter().collect();
    if !inputs.is_empty() {
        println!("Run inputs: {}", inputs.join(", "));
    }

    if show {
        println!("\n{}", config.to_toml_string()?);
    }

    info!("Crew validation complete");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("client=Acme=Corp").unwrap(),
            ("client".to_string(), "Acme=Corp".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "geo-crew",
            "run",
            "--brief",
            "warehouse",
            "--input",
            "client=Acme",
            "--demo",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.brief.as_deref(), Some("warehouse"));
                assert_eq!(args.inputs, vec![("client".to_string(), "Acme".to_string())]);
                assert!(args.demo);
                assert!(args.json);
            }
            Commands::Validate { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_rejects_conflicting_brief_sources() {
        let result = Cli::try_parse_from([
            "geo-crew",
            "run",
            "--brief",
            "inline",
            "--brief-file",
            "brief.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_demo_inputs_cover_builtin_crew() {
        let config = CrewConfig::geo_assessment().unwrap();
        let args = RunArgs {
            config: None,
            brief: None,
            brief_file: None,
            site_data: None,
            site_data_file: None,
            inputs: vec![],
            demo: true,
            json: false,
        };

        let inputs = collect_inputs(&config, &args).unwrap();
        assert!(inputs[PROJECT_BRIEF].contains("Trondheim"));
        assert!(inputs[SITE_DATA_SUMMARY].contains("BH-01"));
    }
}
