mod config;

use clap::{Parser, Subcommand};
use config::DevcrewConfig;
use devcrew_agents::{CodeGeneratorAgent, LlmClient, MockLlmClient, TestWriterAgent};
use devcrew_core::TaskId;
use devcrew_memory::{FileMemoryClient, InMemoryClient, MemoryClient};
use devcrew_orchestrator::{NewTask, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devcrew", about = "devcrew: task orchestration for development agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "devcrew.toml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator until interrupted
    Run,
    /// Seed the demo tasks, run them to completion and print a summary
    Demo {
        /// Give up after this many cycles
        #[arg(long, default_value_t = 20)]
        max_cycles: usize,
        /// Pause between cycles in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_memory(config: &DevcrewConfig) -> anyhow::Result<Arc<dyn MemoryClient>> {
    match &config.memory.data_dir {
        Some(dir) => {
            let path = dir.join("long_term.jsonl");
            let client = FileMemoryClient::new(path.clone()).await.map_err(|e| {
                anyhow::anyhow!("Failed to open memory log '{}': {e}", path.display())
            })?;
            info!(path = %path.display(), "Using file-backed long-term memory");
            Ok(Arc::new(client))
        }
        None => Ok(Arc::new(InMemoryClient::new())),
    }
}

fn build_llm(config: &DevcrewConfig) -> Arc<dyn LlmClient> {
    if config.use_mock_clients {
        info!("Using mock LLM client");
    } else {
        error!("No real LLM backend is available, falling back to the mock client");
    }
    Arc::new(MockLlmClient::new())
}

async fn register_roster(
    orchestrator: &Orchestrator,
    config: &DevcrewConfig,
    memory: &Arc<dyn MemoryClient>,
    llm: &Arc<dyn LlmClient>,
) -> anyhow::Result<()> {
    for entry in &config.agents.code_generators {
        let agent = CodeGeneratorAgent::new(&entry.name, Arc::clone(memory), Arc::clone(llm));
        orchestrator.register_agent(Arc::new(agent)).await?;
    }
    for entry in &config.agents.test_writers {
        let agent = TestWriterAgent::new(&entry.name, Arc::clone(memory), Arc::clone(llm));
        orchestrator.register_agent(Arc::new(agent)).await?;
    }
    if orchestrator.agents().await.is_empty() {
        warn!("No agents configured; tasks will stay pending");
    }
    Ok(())
}

/// Queue the Fibonacci implementation task and the test task that depends on it.
async fn setup_demo_tasks(orchestrator: &Orchestrator) -> anyhow::Result<(TaskId, TaskId)> {
    let code_task = orchestrator
        .create_task(
            NewTask::new("Implement a function to calculate Fibonacci numbers")
                .requirements([
                    "The function should calculate the nth Fibonacci number",
                    "It should handle inputs up to n=100 efficiently",
                    "It should include proper error handling for invalid inputs",
                    "It should be well-documented with examples",
                ])
                .capability(devcrew_agents::CODE_GENERATION)
                .priority(2),
        )
        .await?;

    let test_task = orchestrator
        .create_task(
            NewTask::new("Write tests for the Fibonacci function")
                .requirements([
                    "Test basic functionality with known Fibonacci numbers",
                    "Test error handling for invalid inputs",
                    "Test edge cases (0, 1, large numbers)",
                    "Ensure all tests are clear and well-documented",
                ])
                .capability(devcrew_agents::TEST_WRITING)
                .depends_on(code_task)
                .priority(1),
        )
        .await?;

    info!(code_task_id = %code_task, test_task_id = %test_task, "Created demo tasks");
    Ok((code_task, test_task))
}

async fn print_summary(orchestrator: &Orchestrator) {
    let counts = orchestrator.task_counts().await;
    println!(
        "Tasks: {} completed, {} failed, {} assigned, {} pending",
        counts.completed, counts.failed, counts.assigned, counts.pending
    );
    for task in orchestrator.tasks().await {
        println!("\n[{}] {}", task.status, task.description);
        if let Some(agent) = &task.assigned_to {
            println!("  agent: {agent}");
        }
        let detail = task
            .result
            .as_ref()
            .and_then(|r| r.get("output").or_else(|| r.get("message")))
            .and_then(serde_json::Value::as_str);
        if let Some(detail) = detail {
            for line in detail.lines() {
                println!("  | {line}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = DevcrewConfig::load(&cli.config).await?;
    let memory = build_memory(&config).await?;
    let llm = build_llm(&config);

    let orchestrator = Orchestrator::new(Arc::clone(&memory)).with_dispatch(true);
    register_roster(&orchestrator, &config, &memory, &llm).await?;

    match cli.command {
        Commands::Run => {
            if config.setup_demo_tasks {
                setup_demo_tasks(&orchestrator).await?;
            }

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down gracefully");
                    on_signal.cancel();
                }
            });

            orchestrator.run(config.interval(), cancel).await;
        }
        Commands::Demo {
            max_cycles,
            interval_ms,
        } => {
            setup_demo_tasks(&orchestrator).await?;

            let interval = Duration::from_millis(interval_ms);
            let mut cycles = 0;
            while cycles < max_cycles && !orchestrator.is_done().await {
                if let Err(e) = orchestrator.run_cycle().await {
                    error!(error = %e, "Error in orchestrator cycle");
                }
                cycles += 1;
                tokio::time::sleep(interval).await;
            }
            // Publish the final counts.
            orchestrator.update_system_state().await?;

            if !orchestrator.is_done().await {
                warn!(cycles, "Demo stopped before every task finished");
            }
            print_summary(&orchestrator).await;
        }
    }

    Ok(())
}
