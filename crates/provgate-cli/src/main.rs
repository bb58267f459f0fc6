//! Provenance Gate CLI
//!
//! The `provgate` command runs one policy evaluation from local files:
//! stages the policy and provenance documents into an isolated workspace,
//! invokes the external evaluator, and prints the resulting violations.

use anyhow::{Context, Result};
use clap::Parser;
use provgate_core::{
    init_tracing, EvaluationInput, LogSink, OpaEvaluator, PolicyGate, DEBUG_VARIABLE,
};
use provgate_task::{TaskProperties, TimelineFeedLogger};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "provgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate a provenance policy against an artifact document", long_about = None)]
struct Cli {
    /// Policy document to evaluate
    #[arg(long)]
    policy: PathBuf,

    /// Provenance document (JSON) the policy is evaluated against
    #[arg(long)]
    input: PathBuf,

    /// Path to the external evaluator binary
    #[arg(long, default_value = "opa")]
    opa: String,

    /// Evaluator timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Base directory for staging workspaces (default: system temp dir)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Task property bag (JSON object of strings); when given, evaluation
    /// messages are also appended to the plan's timeline feed
    #[arg(long)]
    task_properties: Option<PathBuf>,

    /// Request full evaluator explanations and verbose gating
    #[arg(long)]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Print the full outcome as JSON instead of one violation per line
    #[arg(long)]
    json_output: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let policy = std::fs::read_to_string(&cli.policy)
        .with_context(|| format!("failed to read policy {}", cli.policy.display()))?;
    let provenance = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read provenance {}", cli.input.display()))?;

    let mut variables = HashMap::new();
    variables.insert(DEBUG_VARIABLE.to_string(), cli.debug.to_string());

    let input = EvaluationInput {
        policy,
        provenance,
        invocation_id: Uuid::new_v4().to_string(),
        variables,
    };

    let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();
    if let Some(path) = &cli.task_properties {
        let bag: HashMap<String, String> = serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("failed to read task properties {}", path.display()))?,
        )
        .context("task properties must be a JSON object of strings")?;
        let properties = TaskProperties::from_map(&bag)?;
        sinks.push(Arc::new(TimelineFeedLogger::new(&properties)));
    }

    let base_dir = cli.workdir.unwrap_or_else(std::env::temp_dir);
    let evaluator = OpaEvaluator::new(cli.opa, Duration::from_secs(cli.timeout_secs));
    let gate = PolicyGate::new(base_dir, Arc::new(evaluator)).with_sinks(sinks);

    let outcome = gate.evaluate(&input).await?;

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.passed() {
        info!("No policy violations reported");
    } else {
        for violation in &outcome.violations {
            println!("{violation}");
        }
    }

    Ok(())
}
