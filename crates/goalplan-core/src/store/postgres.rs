//! PostgreSQL-backed [`PlanStore`].

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use goalplan_db::models::{Goal, GoalSummary, JobStatus, PlanJob, Task, TaskDependency};
use goalplan_db::queries::{goals as goal_queries, jobs as job_queries, tasks as task_queries};

use super::{EdgeInsert, GraphWriter, PlanStore};
use crate::graph::has_cycle;
use crate::plan::TaskSpec;

/// A [`PlanStore`] over a connection pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Graph writes inside one database transaction. Rolls back on drop.
pub struct PgGraphWriter {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GraphWriter for PgGraphWriter {
    async fn create_tasks(&mut self, goal_id: Uuid, specs: &[TaskSpec]) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            let position = i32::try_from(position).context("too many tasks in plan")?;
            let task = task_queries::insert_task(
                &mut *self.tx,
                goal_id,
                &spec.name,
                &spec.description,
                spec.duration_days_i32(),
                position,
            )
            .await?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn create_edges(&mut self, edges: &[TaskDependency]) -> Result<()> {
        for edge in edges {
            task_queries::insert_task_dependency(&mut *self.tx, edge.task_id, edge.depends_on)
                .await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("failed to commit task graph")?;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn begin_graph(&self) -> Result<Box<dyn GraphWriter>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        Ok(Box::new(PgGraphWriter { tx }))
    }

    async fn create_goal(&self, text: &str) -> Result<Goal> {
        goal_queries::insert_goal(&self.pool, text).await
    }

    async fn get_goal(&self, goal_id: Uuid) -> Result<Option<Goal>> {
        goal_queries::get_goal(&self.pool, goal_id).await
    }

    async fn delete_goal(&self, goal_id: Uuid) -> Result<bool> {
        goal_queries::delete_goal(&self.pool, goal_id).await
    }

    async fn list_goals(&self, offset: i64, limit: i64) -> Result<Vec<GoalSummary>> {
        goal_queries::list_goal_summaries(&self.pool, offset, limit).await
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        task_queries::get_task(&self.pool, task_id).await
    }

    async fn list_tasks(&self, goal_id: Uuid) -> Result<Vec<Task>> {
        task_queries::list_tasks_for_goal(&self.pool, goal_id).await
    }

    async fn delete_tasks(&self, goal_id: Uuid) -> Result<u64> {
        task_queries::delete_tasks_for_goal(&self.pool, goal_id).await
    }

    async fn list_edges(&self, goal_id: Uuid) -> Result<Vec<TaskDependency>> {
        task_queries::list_dependencies_for_goal(&self.pool, goal_id).await
    }

    async fn insert_edge_checked(
        &self,
        goal_id: Uuid,
        edge: TaskDependency,
    ) -> Result<EdgeInsert> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        if !goal_queries::lock_goal(&mut *tx, goal_id).await? {
            bail!("goal {goal_id} does not exist");
        }

        let edges = task_queries::list_dependencies_for_goal(&mut *tx, goal_id).await?;
        if has_cycle(&edges, edge.task_id, edge.depends_on) {
            return Ok(EdgeInsert::WouldCycle);
        }
        let inserted =
            task_queries::insert_task_dependency(&mut *tx, edge.task_id, edge.depends_on).await?;
        tx.commit()
            .await
            .context("failed to commit task dependency")?;

        Ok(if inserted {
            EdgeInsert::Inserted
        } else {
            EdgeInsert::AlreadyExists
        })
    }

    async fn create_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        job_queries::insert_job(&self.pool, goal_id).await
    }

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        let rows = job_queries::transition_job(&self.pool, job_id, from, to, detail).await?;
        if rows == 0 {
            bail!("plan job {job_id} is not in state {from}; cannot move to {to}");
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<PlanJob>> {
        job_queries::get_job(&self.pool, job_id).await
    }

    async fn active_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        job_queries::active_job_for_goal(&self.pool, goal_id).await
    }

    async fn latest_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        job_queries::latest_job_for_goal(&self.pool, goal_id).await
    }
}
