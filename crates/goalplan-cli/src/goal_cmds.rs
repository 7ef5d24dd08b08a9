//! Operator CLI handlers for `goalplan goal` subcommands.
//!
//! Implements:
//! - `goalplan goal create <text>`         -- create a goal and generate its plan
//! - `goalplan goal list`                  -- list goals with task progress
//! - `goalplan goal show <goal-id>`        -- goal, tasks, dependencies, schedule
//! - `goalplan goal regenerate <goal-id>`  -- replace the goal's plan
//! - `goalplan goal status <goal-id> <s>`  -- set goal status
//! - `goalplan goal delete <goal-id>`      -- delete the goal

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use goalplan_core::completion::CompletionConfig;
use goalplan_core::goals::GoalService;
use goalplan_core::graph::{schedule, total_days};
use goalplan_core::orchestrator::ScheduledJob;
use goalplan_core::store::{PgPlanStore, PlanStore};
use goalplan_db::models::{GoalStatus, JobStatus};
use goalplan_db::queries::goals as goal_queries;

use crate::GoalCommands;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `GoalCommands` variant to the appropriate handler.
pub async fn run_goal_command(
    command: GoalCommands,
    pool: &PgPool,
    completion: &CompletionConfig,
) -> Result<()> {
    let store = PgPlanStore::new(pool.clone());
    match command {
        GoalCommands::Create { text } => {
            let goals = goal_service(store, completion)?;
            cmd_create(&goals, &text).await
        }
        GoalCommands::List { offset, limit } => cmd_list(&store, offset, limit).await,
        GoalCommands::Show { goal_id } => cmd_show(&store, &goal_id).await,
        GoalCommands::Regenerate { goal_id } => {
            let goals = goal_service(store, completion)?;
            cmd_regenerate(&goals, &goal_id).await
        }
        GoalCommands::Status { goal_id, status } => cmd_status(pool, &goal_id, &status).await,
        GoalCommands::Delete { goal_id } => cmd_delete(&store, &goal_id).await,
    }
}

fn goal_service(store: PgPlanStore, completion: &CompletionConfig) -> Result<GoalService> {
    let orchestrator = crate::build_orchestrator(completion)?;
    Ok(GoalService::new(Arc::new(store), orchestrator))
}

fn parse_goal_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid goal ID: {raw}"))
}

/// Wait for a plan job and report its outcome.
///
/// A CLI process would exit before a detached job finishes, so the job is
/// awaited here after the "processing" status has been printed.
async fn await_job(store: &dyn PlanStore, job: ScheduledJob) -> Result<()> {
    println!("  Plan job:  {} (processing)", job.job_id);

    let status = job.handle.await.context("plan job panicked")?;
    let detail = store
        .get_job(job.job_id)
        .await?
        .and_then(|j| j.detail)
        .unwrap_or_default();

    match status {
        JobStatus::Succeeded => println!("Plan generated: {detail}"),
        JobStatus::FallbackUsed => println!("Fallback plan used: {detail}"),
        JobStatus::Failed => anyhow::bail!("plan generation failed: {detail}"),
        JobStatus::Queued | JobStatus::Running => println!("Plan job ended in state {status}"),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// goalplan goal create <text>
// -----------------------------------------------------------------------

async fn cmd_create(goals: &GoalService, text: &str) -> Result<()> {
    let (goal, job) = goals.create_goal(text).await?;

    println!("Goal created.");
    println!();
    println!("  Goal ID:   {}", goal.id);
    println!("  Text:      {}", goal.text);
    await_job(goals.store().as_ref(), job).await?;
    println!();
    println!("Run `goalplan goal show {}` to see the plan.", goal.id);
    Ok(())
}

// -----------------------------------------------------------------------
// goalplan goal list
// -----------------------------------------------------------------------

async fn cmd_list(store: &dyn PlanStore, offset: i64, limit: i64) -> Result<()> {
    let goals = store.list_goals(offset, limit).await?;

    if goals.is_empty() {
        println!("No goals found. Use `goalplan goal create <text>` to create one.");
        return Ok(());
    }

    println!(
        "{:<38} {:<40} {:<10} {:>8}  CREATED",
        "ID", "GOAL", "STATUS", "PROGRESS"
    );
    println!("{}", "-".repeat(116));

    for goal in &goals {
        let text: String = if goal.text.chars().count() > 38 {
            format!("{}...", goal.text.chars().take(35).collect::<String>())
        } else {
            goal.text.clone()
        };
        let progress = format!("{}/{}", goal.completed_tasks, goal.task_count);
        println!(
            "{:<38} {:<40} {:<10} {:>8}  {}",
            goal.id,
            text,
            goal.status,
            progress,
            goal.created_at.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// goalplan goal show <goal-id>
// -----------------------------------------------------------------------

async fn cmd_show(store: &dyn PlanStore, goal_id: &str) -> Result<()> {
    let goal_id = parse_goal_id(goal_id)?;
    let goal = store
        .get_goal(goal_id)
        .await?
        .with_context(|| format!("goal {goal_id} not found"))?;

    println!("Goal: {}", goal.text);
    println!("  ID:       {}", goal.id);
    println!("  Status:   {}", goal.status);
    println!(
        "  Created:  {}",
        goal.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(job) = store.latest_job(goal_id).await? {
        match job.detail {
            Some(detail) => println!("  Plan job: {} ({detail})", job.status),
            None => println!("  Plan job: {}", job.status),
        }
    }

    let tasks = store.list_tasks(goal_id).await?;
    if tasks.is_empty() {
        println!();
        println!("No tasks.");
        return Ok(());
    }

    let edges = store.list_edges(goal_id).await?;
    let scheduled = schedule(&tasks, &edges)?;
    let names: HashMap<Uuid, &str> = tasks.iter().map(|t| (t.id, t.name.as_str())).collect();

    println!("  Duration: {} day(s)", total_days(&scheduled));
    println!();
    println!("Tasks:");
    println!();

    for (task, slot) in tasks.iter().zip(&scheduled) {
        println!("  [{}] {}", task.status, task.name);
        println!("    ID:          {}", task.id);
        println!(
            "    Days:        {}-{} ({} day(s))",
            slot.start_day, slot.end_day, task.duration_days
        );
        let deps: Vec<&str> = edges
            .iter()
            .filter(|e| e.task_id == task.id)
            .filter_map(|e| names.get(&e.depends_on).copied())
            .collect();
        if !deps.is_empty() {
            println!("    Depends on:  {}", deps.join(", "));
        }
        if !task.description.is_empty() {
            println!("    {}", task.description);
        }
        println!();
    }

    Ok(())
}

// -----------------------------------------------------------------------
// goalplan goal regenerate <goal-id>
// -----------------------------------------------------------------------

async fn cmd_regenerate(goals: &GoalService, goal_id: &str) -> Result<()> {
    let goal_id = parse_goal_id(goal_id)?;
    let job = goals.regenerate_tasks(goal_id).await?;

    println!("Regenerating plan for goal {goal_id}.");
    await_job(goals.store().as_ref(), job).await
}

// -----------------------------------------------------------------------
// goalplan goal status <goal-id> <status>
// -----------------------------------------------------------------------

async fn cmd_status(pool: &PgPool, goal_id: &str, status: &str) -> Result<()> {
    let goal_id = parse_goal_id(goal_id)?;
    let status: GoalStatus = status.parse()?;

    goal_queries::update_goal_status(pool, goal_id, status).await?;
    println!("Goal {goal_id} is now {status}.");
    Ok(())
}

// -----------------------------------------------------------------------
// goalplan goal delete <goal-id>
// -----------------------------------------------------------------------

async fn cmd_delete(store: &dyn PlanStore, goal_id: &str) -> Result<()> {
    let goal_id = parse_goal_id(goal_id)?;
    if !store.delete_goal(goal_id).await? {
        anyhow::bail!("goal {goal_id} not found");
    }
    println!("Goal {goal_id} deleted.");
    Ok(())
}
