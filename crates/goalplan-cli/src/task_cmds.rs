//! Operator CLI handlers for `goalplan task` subcommands.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use goalplan_core::graph::add_dependency;
use goalplan_core::store::PgPlanStore;
use goalplan_db::models::TaskStatus;
use goalplan_db::queries::tasks as task_queries;

use crate::TaskCommands;

/// Dispatch a `TaskCommands` variant to the appropriate handler.
pub async fn run_task_command(command: TaskCommands, pool: &PgPool) -> Result<()> {
    match command {
        TaskCommands::Depend {
            task_id,
            depends_on,
        } => cmd_depend(pool, &task_id, &depends_on).await,
        TaskCommands::Status { task_id, status } => cmd_status(pool, &task_id, &status).await,
    }
}

fn parse_task_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid task ID: {raw}"))
}

async fn cmd_depend(pool: &PgPool, task_id: &str, depends_on: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let depends_on = parse_task_id(depends_on)?;

    let store = PgPlanStore::new(pool.clone());
    if add_dependency(&store, task_id, depends_on).await? {
        println!("Task {task_id} now depends on {depends_on}.");
    } else {
        println!("Task {task_id} already depends on {depends_on}.");
    }
    Ok(())
}

async fn cmd_status(pool: &PgPool, task_id: &str, status: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let status: TaskStatus = status.parse()?;

    task_queries::update_task_status(pool, task_id, status).await?;
    println!("Task {task_id} is now {status}.");
    Ok(())
}
