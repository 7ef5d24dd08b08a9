//! Database query functions for the `tasks` and `task_dependencies` tables.
//!
//! Insert functions are generic over the executor so the plan materializer
//! can run them inside a single transaction.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Task, TaskDependency, TaskStatus};

/// Insert a new task row. Returns the inserted task with server-generated
/// defaults (id, created_at, status).
pub async fn insert_task<'e, E>(
    executor: E,
    goal_id: Uuid,
    name: &str,
    description: &str,
    duration_days: i32,
    position: i32,
) -> Result<Task>
where
    E: PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (goal_id, name, description, duration_days, position) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(goal_id)
    .bind(name)
    .bind(description)
    .bind(duration_days)
    .bind(position)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert task {name:?}"))?;

    Ok(task)
}

/// Fetch a single task by ID.
pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// List all tasks for a goal in plan order.
pub async fn list_tasks_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE goal_id = $1 ORDER BY position ASC, created_at ASC",
    )
    .bind(goal_id)
    .fetch_all(pool)
    .await
    .context("failed to list tasks for goal")?;

    Ok(tasks)
}

/// Delete every task of a goal. Dependency edges cascade.
///
/// Returns the number of deleted tasks.
pub async fn delete_tasks_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM tasks WHERE goal_id = $1")
        .bind(goal_id)
        .execute(pool)
        .await
        .context("failed to delete tasks for goal")?;

    Ok(result.rows_affected())
}

/// Update the status of a task.
pub async fn update_task_status(pool: &PgPool, id: Uuid, status: TaskStatus) -> Result<()> {
    let result = sqlx::query("UPDATE tasks SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update task status")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("task {id} not found");
    }

    Ok(())
}

/// Insert a dependency edge: `task_id` depends on `depends_on`.
///
/// Uses `ON CONFLICT DO NOTHING` so this is idempotent. Returns `true` when
/// a new edge was written.
pub async fn insert_task_dependency<'e, E>(
    executor: E,
    task_id: Uuid,
    depends_on: Uuid,
) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO task_dependencies (task_id, depends_on) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(task_id)
    .bind(depends_on)
    .execute(executor)
    .await
    .context("failed to insert task dependency")?;

    Ok(result.rows_affected() > 0)
}

/// All dependency edges whose dependent task belongs to the goal.
pub async fn list_dependencies_for_goal<'e, E>(
    executor: E,
    goal_id: Uuid,
) -> Result<Vec<TaskDependency>>
where
    E: PgExecutor<'e>,
{
    let edges = sqlx::query_as::<_, TaskDependency>(
        "SELECT td.task_id, td.depends_on FROM task_dependencies td \
         JOIN tasks t ON t.id = td.task_id \
         WHERE t.goal_id = $1 \
         ORDER BY t.position, td.created_at",
    )
    .bind(goal_id)
    .fetch_all(executor)
    .await
    .context("failed to list dependencies for goal")?;

    Ok(edges)
}

/// Count total dependency edges for a goal.
pub async fn count_dependency_edges(pool: &PgPool, goal_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM task_dependencies td \
         JOIN tasks t ON t.id = td.task_id \
         WHERE t.goal_id = $1",
    )
    .bind(goal_id)
    .fetch_one(pool)
    .await
    .context("failed to count dependency edges")?;

    Ok(row.0)
}
