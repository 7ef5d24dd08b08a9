mod config;
mod goal_cmds;
mod plan_cmd;
mod task_cmds;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use goalplan_core::completion::{CompletionClient, CompletionConfig, GroqProvider};
use goalplan_core::orchestrator::PlanningOrchestrator;
use goalplan_db::pool;

use config::GoalplanConfig;

#[derive(Parser)]
#[command(name = "goalplan", about = "Turn free-text goals into dependency-ordered task plans")]
struct Cli {
    /// Database URL (overrides GOALPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a goalplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/goalplan")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the goalplan database (requires config file or env vars)
    DbInit,
    /// Generate a plan for a goal without touching the database and print it as JSON
    Plan {
        /// Goal text
        goal: String,
        /// Skip the completion provider and print the fallback plan
        #[arg(long)]
        offline: bool,
    },
    /// Goal management
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a goal and generate its plan
    Create {
        /// Goal text
        text: String,
    },
    /// List goals with task progress
    List {
        /// Number of goals to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Maximum number of goals to show
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show a goal with its tasks, dependencies and schedule
    Show {
        /// Goal ID
        goal_id: String,
    },
    /// Delete all tasks of a goal and generate a new plan
    Regenerate {
        /// Goal ID
        goal_id: String,
    },
    /// Set goal status: active, completed or archived
    Status {
        /// Goal ID
        goal_id: String,
        /// New status
        status: String,
    },
    /// Delete a goal with its tasks and jobs
    Delete {
        /// Goal ID
        goal_id: String,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Make a task depend on another task of the same goal
    Depend {
        /// Dependent task ID
        task_id: String,
        /// Prerequisite task ID
        depends_on: String,
    },
    /// Set task status: pending, in_progress or completed
    Status {
        /// Task ID
        task_id: String,
        /// New status
        status: String,
    },
}

/// Build the planning orchestrator over the live completion provider.
fn build_orchestrator(completion: &CompletionConfig) -> anyhow::Result<Arc<PlanningOrchestrator>> {
    let provider = GroqProvider::from_config(completion)
        .context("failed to configure completion provider")?;
    let client = CompletionClient::new(Arc::new(provider), completion);
    Ok(Arc::new(PlanningOrchestrator::new(client)))
}

/// Execute the `goalplan init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        completion: CompletionConfig::default(),
    };

    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  completion.model = {}", cfg.completion.model);
    println!();
    println!(
        "Next: export {} and run `goalplan db-init` to create and migrate the database.",
        cfg.completion.api_key_env
    );

    Ok(())
}

/// Execute the `goalplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = GoalplanConfig::resolve(cli_db_url)?;

    println!("Initializing goalplan database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("goalplan db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `goalplan plan` output stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Plan { goal, offline } => {
            let resolved = GoalplanConfig::resolve(cli.database_url.as_deref())?;
            let orchestrator = if offline {
                None
            } else {
                Some(build_orchestrator(&resolved.completion)?)
            };
            plan_cmd::run_plan(&goal, orchestrator.as_deref()).await?;
        }
        Commands::Goal { command } => {
            let resolved = GoalplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result =
                goal_cmds::run_goal_command(command, &db_pool, &resolved.completion).await;
            db_pool.close().await;
            result?;
        }
        Commands::Task { command } => {
            let resolved = GoalplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = task_cmds::run_task_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
