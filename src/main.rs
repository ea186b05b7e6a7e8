use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chainrun_core::config::{AppConfig, GenerationConfig};
use chainrun_core::traits::{ExecutionStore, RunStore, UserStore, WorkflowStore};
use chainrun_core::types::WorkflowDraft;
use chainrun_engine::{ExecutionEngine, ExecutionService, RunQueue};
use chainrun_gateway::GatewayServer;
use chainrun_store::SqliteStore;

#[derive(Parser)]
#[command(name = "chainrun", version, about = "Run chained text-generation workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "chainrun.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and background run workers
    Serve,
    /// Execute a workflow JSON file once and print the results
    Run {
        /// File containing `{name, nodes, edges}`
        workflow: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user and print its id
    Add { email: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chainrun=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "chainrun", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Run { workflow } => run_file(&config, &workflow).await?,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        Commands::User {
            action: UserAction::Add { email },
        } => {
            let store = SqliteStore::open(&config.database_path())?;
            let user = store.create_user(email).await?;
            println!("Created user {} ({})", user.id, user.email);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    // Check for config in the home directory
    if let Some(home_config) = dirs_home().map(|h| h.join(".chainrun").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }

    eprintln!("Warning: No config file found. Set GEMINI_API_KEY or create chainrun.toml");
    Ok(create_env_config())
}

/// Minimal config when no file exists.
fn create_env_config() -> AppConfig {
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    if api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; prompt nodes will fail");
    }
    AppConfig {
        database: Default::default(),
        generation: GenerationConfig {
            api_key,
            ..Default::default()
        },
        gateway: Default::default(),
        runner: Default::default(),
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let db_path = config.database_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;

    let generator = chainrun_llm::create_generator(&config.generation)?;
    let engine = Arc::new(ExecutionEngine::from_config(generator, &config.generation));

    let cancel = CancellationToken::new();
    let (queue, workers) = RunQueue::start(
        engine,
        Arc::new(store.clone()),
        &config.runner,
        cancel.clone(),
    );

    let shared: Arc<dyn RunStore> = Arc::new(store);
    let executions = ExecutionService::new(shared.clone(), queue);

    if config.gateway.api_keys.is_empty() {
        warn!("No gateway API keys configured; every request will be rejected");
    }
    info!(bind = %config.gateway.bind, db = %db_path.display(), "Starting gateway");
    let server = GatewayServer::new(config.gateway.clone(), shared, executions);

    // Graceful shutdown on Ctrl-C
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down gateway...");
        cancel_clone.cancel();
    });

    server.run(cancel.clone()).await?;

    cancel.cancel();
    for worker in workers {
        worker.await.ok();
    }
    Ok(())
}

async fn run_file(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow file {}", path.display()))?;
    let draft: WorkflowDraft = serde_json::from_str(&content)
        .with_context(|| format!("parsing workflow file {}", path.display()))?;

    let store = SqliteStore::in_memory()?;
    let user = store.create_user("cli@localhost".to_string()).await?;
    let workflow = store.create_workflow(user.id, draft).await?;
    let execution = store.create_execution(workflow.id).await?;

    let generator = chainrun_llm::create_generator(&config.generation)?;
    let engine = ExecutionEngine::from_config(generator, &config.generation);
    engine.run(&store, workflow.id, execution.id).await;

    let finished = store
        .load_execution(execution.id)
        .await?
        .context("execution vanished from the in-memory store")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "status": finished.status,
            "results": finished.results,
        }))?
    );

    if let Some(message) = finished.error_message() {
        anyhow::bail!("workflow failed: {}", message);
    }
    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
