//! Command-line entry point for the engine.
//!
//! ## Commands
//!
//! - `replay`: run bounded iteration against a scripted transport
//! - `config-paths`: show where configuration files are looked up

use acton_engine::config::{self, EngineConfig};
use acton_engine::engine::{
    AgentLoop, BoundedIteration, CommandValidator, IterationOutcome, ScriptedTransport,
    TracingEventSink, Validator, Verdict,
};
use acton_engine::error::EngineError;
use acton_engine::logging::{init_logging, LogLevel};
use acton_engine::protocol::ProtocolFormat;
use acton_engine::sandbox::Workspace;
use acton_engine::tools::ToolRegistry;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "acton-engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sandboxed tool-augmented agent execution engine", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: search the standard locations)
    #[arg(short, long, global = true, env = "ACTON_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay scripted model outputs through bounded iteration
    Replay {
        /// JSON array of model outputs (strings or {text, tool_calls} objects)
        #[arg(short, long)]
        script: PathBuf,

        /// Existing directory the task is confined to
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Task description given to the model
        #[arg(short, long, default_value = "Complete the scripted task.")]
        task: String,

        /// Wire format: tagged-inline or structured-call
        #[arg(long)]
        protocol: Option<ProtocolFormat>,

        /// Turn budget per attempt
        #[arg(long)]
        max_turns: Option<u32>,

        /// Attempt ceiling
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Additional allow-listed command (repeatable)
        #[arg(long = "allow")]
        allow: Vec<String>,

        /// Validator command and arguments, run in the workspace after each
        /// completed attempt
        #[arg(last = true)]
        validator: Vec<String>,
    },

    /// Print the configuration search paths
    ConfigPaths,
}

/// Accepts every completed attempt.
#[derive(Debug)]
struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(
        &self,
        _artifacts: &acton_engine::engine::ArtifactSet,
        _workspace: &Workspace,
    ) -> Verdict {
        Verdict::Pass
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, EngineError> {
    match cli.command {
        Commands::ConfigPaths => {
            for path in config::search_paths() {
                let marker = if path.exists() { "found" } else { "missing" };
                println!("{} ({marker})", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Replay {
            script,
            workspace,
            task,
            protocol,
            max_turns,
            max_attempts,
            allow,
            validator,
        } => {
            let mut config = match &cli.config {
                Some(path) => config::from_path(path)?,
                None => config::load()?,
            };
            if cli.verbose {
                config.logging.level = LogLevel::Debug;
            }
            if let Some(protocol) = protocol {
                config.protocol = protocol;
            }
            if let Some(max_turns) = max_turns {
                config.max_turns = max_turns;
            }
            if let Some(max_attempts) = max_attempts {
                config.max_attempts = max_attempts;
            }
            config.workspace.allowed_commands.extend(allow);
            if let Some(program) = validator.first() {
                config.workspace.allowed_commands.push(program.clone());
            }
            config.validate()?;

            let _guard = init_logging(&config.logging)
                .map_err(|e| EngineError::configuration("logging", e.to_string()))?;

            replay(&config, &script, &workspace, &task, validator).await
        }
    }
}

async fn replay(
    config: &EngineConfig,
    script: &std::path::Path,
    root: &std::path::Path,
    task: &str,
    validator: Vec<String>,
) -> Result<ExitCode, EngineError> {
    let transport = ScriptedTransport::from_file(script)
        .map_err(|e| EngineError::configuration("script", e.reason))?;
    let workspace = config.workspace.open(root)?;

    let agent = AgentLoop::new(
        Arc::new(ToolRegistry::with_builtins()),
        Arc::new(transport),
        config,
    )?
    .with_event_sink(Arc::new(TracingEventSink));
    let iteration = BoundedIteration::new(agent, config.task_deadline());

    let validator: Box<dyn Validator> = match validator.split_first() {
        Some((program, args)) => Box::new(
            CommandValidator::new(program.clone(), args.iter().cloned())
                .with_timeout(config.tool_timeout()),
        ),
        None => Box::new(AcceptAll),
    };

    let outcome = iteration
        .run(task, &workspace, validator.as_ref(), config.max_attempts)
        .await;

    for attempt in outcome.attempts() {
        println!(
            "attempt {}: {} after {} turn(s), {}",
            attempt.index,
            attempt.outcome.state(),
            attempt.outcome.run().turns(),
            if attempt.passed() { "passed" } else { "failed" }
        );
    }

    match outcome {
        IterationOutcome::Succeeded { artifacts, .. } => {
            println!("succeeded");
            for path in artifacts.display(&workspace) {
                println!("  changed: {path}");
            }
            Ok(ExitCode::SUCCESS)
        }
        IterationOutcome::Failed {
            last_diagnostic, ..
        } => {
            println!("failed");
            println!("{last_diagnostic}");
            Ok(ExitCode::FAILURE)
        }
        IterationOutcome::Fatal { error, .. } => Err(error),
    }
}
