//! Database query functions for the `goals` table.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Goal, GoalStatus, GoalSummary};

/// Insert a new goal. Returns the row with server-generated defaults
/// (id, status, created_at).
pub async fn insert_goal(pool: &PgPool, text: &str) -> Result<Goal> {
    let goal = sqlx::query_as::<_, Goal>("INSERT INTO goals (text) VALUES ($1) RETURNING *")
        .bind(text)
        .fetch_one(pool)
        .await
        .context("failed to insert goal")?;

    Ok(goal)
}

/// Fetch a goal by its ID.
pub async fn get_goal(pool: &PgPool, id: Uuid) -> Result<Option<Goal>> {
    let goal = sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch goal")?;

    Ok(goal)
}

/// Take a row lock on the goal for the rest of the transaction.
///
/// Serializes writers that read and then modify a goal's dependency graph.
/// Returns `false` if the goal does not exist.
pub async fn lock_goal<'e, E>(executor: E, id: Uuid) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM goals WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to lock goal")?;

    Ok(row.is_some())
}

/// List goals with task counters, newest first.
pub async fn list_goal_summaries(pool: &PgPool, offset: i64, limit: i64) -> Result<Vec<GoalSummary>> {
    let goals = sqlx::query_as::<_, GoalSummary>(
        "SELECT g.id, g.text, g.status, g.created_at, \
                COUNT(t.id) AS task_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'completed') AS completed_tasks \
         FROM goals g \
         LEFT JOIN tasks t ON t.goal_id = g.id \
         GROUP BY g.id \
         ORDER BY g.created_at DESC \
         OFFSET $1 LIMIT $2",
    )
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list goals")?;

    Ok(goals)
}

/// Update the status of a goal.
pub async fn update_goal_status(pool: &PgPool, id: Uuid, status: GoalStatus) -> Result<()> {
    let result = sqlx::query("UPDATE goals SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update goal status")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("goal {id} not found");
    }

    Ok(())
}

/// Delete a goal. Tasks, dependency edges and jobs cascade.
///
/// Returns `false` when no such goal existed.
pub async fn delete_goal(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM goals WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete goal")?;

    Ok(result.rows_affected() > 0)
}
