//! Database query functions for the `plan_jobs` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{JobStatus, PlanJob};

/// Record a new job in `queued` state.
///
/// Returns `None` when the goal already has a queued or running job. The
/// partial unique index on `plan_jobs (goal_id)` makes the check and the
/// insert one atomic step.
pub async fn insert_job(pool: &PgPool, goal_id: Uuid) -> Result<Option<PlanJob>> {
    let job = sqlx::query_as::<_, PlanJob>(
        "INSERT INTO plan_jobs (goal_id) VALUES ($1) \
         ON CONFLICT (goal_id) WHERE status IN ('queued', 'running') DO NOTHING \
         RETURNING *",
    )
    .bind(goal_id)
    .fetch_optional(pool)
    .await
    .context("failed to insert plan job")?;

    Ok(job)
}

/// Fetch a job by ID.
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<PlanJob>> {
    let job = sqlx::query_as::<_, PlanJob>("SELECT * FROM plan_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan job")?;

    Ok(job)
}

/// The most recently created job for a goal, if any.
pub async fn latest_job_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Option<PlanJob>> {
    let job = sqlx::query_as::<_, PlanJob>(
        "SELECT * FROM plan_jobs WHERE goal_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(goal_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest plan job")?;

    Ok(job)
}

/// A queued or running job for the goal, if one exists.
pub async fn active_job_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Option<PlanJob>> {
    let job = sqlx::query_as::<_, PlanJob>(
        "SELECT * FROM plan_jobs \
         WHERE goal_id = $1 AND status IN ('queued', 'running') \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(goal_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch active plan job")?;

    Ok(job)
}

/// Transition a job between states.
///
/// `started_at` is stamped on entering `running`; `finished_at` on entering
/// any terminal state. Uses optimistic locking on `from`: returns the
/// number of rows affected (0 means the job was not in `from`).
pub async fn transition_job(
    pool: &PgPool,
    id: Uuid,
    from: JobStatus,
    to: JobStatus,
    detail: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE plan_jobs \
         SET status = $1, \
             detail = COALESCE($2, detail), \
             started_at = CASE WHEN $1 = 'running' THEN now() ELSE started_at END, \
             finished_at = CASE WHEN $1 IN ('succeeded', 'fallback_used', 'failed') \
                                THEN now() ELSE finished_at END \
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(detail)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition plan job")?;

    Ok(result.rows_affected())
}
