//! Storage abstraction used by the planning pipeline.
//!
//! [`PlanStore`] is implemented over PostgreSQL ([`PgPlanStore`]) and in
//! memory ([`InMemoryPlanStore`], used for dry runs and tests). Graph writes
//! go through a [`GraphWriter`], which stages nodes and edges and makes them
//! visible together on [`GraphWriter::commit`]. Dropping a writer without
//! committing discards everything it staged.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use goalplan_db::models::{Goal, GoalSummary, JobStatus, PlanJob, Task, TaskDependency};

use crate::plan::TaskSpec;

pub use memory::InMemoryPlanStore;
pub use postgres::PgPlanStore;

/// Outcome of [`PlanStore::insert_edge_checked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted,
    AlreadyExists,
    /// The edge would close a cycle and was not written.
    WouldCycle,
}

/// One atomic batch of task and edge inserts for a goal.
#[async_trait]
pub trait GraphWriter: Send {
    /// Create one task per spec, in order, assigning `position` by index.
    async fn create_tasks(&mut self, goal_id: Uuid, specs: &[TaskSpec]) -> Result<Vec<Task>>;

    /// Create dependency edges between tasks created by this writer (or
    /// already committed). Duplicate edges are ignored.
    async fn create_edges(&mut self, edges: &[TaskDependency]) -> Result<()>;

    /// Make every staged write visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Goal, task, edge and job persistence.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Start an atomic graph write.
    async fn begin_graph(&self) -> Result<Box<dyn GraphWriter>>;

    async fn create_goal(&self, text: &str) -> Result<Goal>;
    async fn get_goal(&self, goal_id: Uuid) -> Result<Option<Goal>>;
    /// Delete a goal with its tasks, edges and jobs. Returns `false` if it
    /// did not exist.
    async fn delete_goal(&self, goal_id: Uuid) -> Result<bool>;
    /// Goals with task counters, newest first.
    async fn list_goals(&self, offset: i64, limit: i64) -> Result<Vec<GoalSummary>>;

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>>;
    /// Tasks of a goal in plan order.
    async fn list_tasks(&self, goal_id: Uuid) -> Result<Vec<Task>>;
    /// Delete every task of a goal, together with their edges.
    async fn delete_tasks(&self, goal_id: Uuid) -> Result<u64>;

    /// Edges whose dependent task belongs to the goal.
    async fn list_edges(&self, goal_id: Uuid) -> Result<Vec<TaskDependency>>;
    /// Insert a single edge of the goal's graph outside a graph batch.
    ///
    /// The cycle check and the insert happen atomically with respect to
    /// other checked inserts for the same goal.
    async fn insert_edge_checked(&self, goal_id: Uuid, edge: TaskDependency) -> Result<EdgeInsert>;

    /// Record a `queued` job for the goal. Returns `None` without writing
    /// anything if the goal already has a queued or running job.
    async fn create_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>>;
    /// Move a job from `from` to `to`. Fails if the job is not in `from`.
    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        detail: Option<&str>,
    ) -> Result<()>;
    async fn get_job(&self, job_id: Uuid) -> Result<Option<PlanJob>>;
    /// The queued or running job of a goal, if any.
    async fn active_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>>;
    async fn latest_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore, _: &dyn GraphWriter) {}
};
