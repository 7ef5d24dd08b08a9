//! In-memory [`PlanStore`] for dry runs and tests.
//!
//! Mirrors the database constraints the pipeline relies on: tasks must
//! belong to an existing goal, edges must join existing tasks, self-edges
//! are rejected, duplicate edges are ignored and deletes cascade.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use goalplan_db::models::{
    Goal, GoalStatus, GoalSummary, JobStatus, PlanJob, Task, TaskDependency, TaskStatus,
};

use super::{EdgeInsert, GraphWriter, PlanStore};
use crate::graph::has_cycle;
use crate::plan::TaskSpec;

#[derive(Debug, Default)]
struct MemoryState {
    goals: Vec<Goal>,
    tasks: Vec<Task>,
    edges: Vec<TaskDependency>,
    jobs: Vec<PlanJob>,
}

impl MemoryState {
    fn has_goal(&self, goal_id: Uuid) -> bool {
        self.goals.iter().any(|g| g.id == goal_id)
    }

    fn has_task(&self, task_id: Uuid) -> bool {
        self.tasks.iter().any(|t| t.id == task_id)
    }

    fn edges_of_goal(&self, goal_id: Uuid) -> Vec<TaskDependency> {
        let owned: HashSet<Uuid> = self
            .tasks
            .iter()
            .filter(|t| t.goal_id == goal_id)
            .map(|t| t.id)
            .collect();
        self.edges
            .iter()
            .filter(|e| owned.contains(&e.task_id))
            .copied()
            .collect()
    }

    fn remove_tasks_where(&mut self, pred: impl Fn(&Task) -> bool) -> u64 {
        let removed: HashSet<Uuid> = self
            .tasks
            .iter()
            .filter(|t| pred(t))
            .map(|t| t.id)
            .collect();
        self.tasks.retain(|t| !removed.contains(&t.id));
        self.edges
            .retain(|e| !removed.contains(&e.task_id) && !removed.contains(&e.depends_on));
        removed.len() as u64
    }
}

/// A [`PlanStore`] held entirely in process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| anyhow!("in-memory plan store lock poisoned"))
}

/// Stages tasks and edges until commit.
struct InMemoryGraphWriter {
    state: Arc<Mutex<MemoryState>>,
    tasks: Vec<Task>,
    edges: Vec<TaskDependency>,
}

impl InMemoryGraphWriter {
    fn knows_task(&self, state: &MemoryState, task_id: Uuid) -> bool {
        self.tasks.iter().any(|t| t.id == task_id) || state.has_task(task_id)
    }
}

#[async_trait]
impl GraphWriter for InMemoryGraphWriter {
    async fn create_tasks(&mut self, goal_id: Uuid, specs: &[TaskSpec]) -> Result<Vec<Task>> {
        if !lock_state(&self.state)?.has_goal(goal_id) {
            bail!("goal {goal_id} does not exist");
        }
        let now = Utc::now();
        let mut created = Vec::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            created.push(Task {
                id: Uuid::new_v4(),
                goal_id,
                name: spec.name.clone(),
                description: spec.description.clone(),
                status: TaskStatus::Pending,
                duration_days: spec.duration_days_i32(),
                position: i32::try_from(position).unwrap_or(i32::MAX),
                created_at: now,
            });
        }
        self.tasks.extend(created.iter().cloned());
        Ok(created)
    }

    async fn create_edges(&mut self, edges: &[TaskDependency]) -> Result<()> {
        let state = lock_state(&self.state)?;
        let mut accepted = Vec::with_capacity(edges.len());
        for edge in edges {
            if edge.task_id == edge.depends_on {
                bail!("task {} cannot depend on itself", edge.task_id);
            }
            for id in [edge.task_id, edge.depends_on] {
                if !self.knows_task(&state, id) {
                    bail!("task {id} does not exist");
                }
            }
            accepted.push(*edge);
        }
        drop(state);
        for edge in accepted {
            if !self.edges.contains(&edge) {
                self.edges.push(edge);
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryGraphWriter { state, tasks, edges } = *self;
        let mut state = lock_state(&state)?;
        for task in &tasks {
            if !state.has_goal(task.goal_id) {
                bail!("goal {} was deleted before the task graph was committed", task.goal_id);
            }
        }
        state.tasks.extend(tasks);
        for edge in edges {
            if !state.edges.contains(&edge) {
                state.edges.push(edge);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn begin_graph(&self) -> Result<Box<dyn GraphWriter>> {
        Ok(Box::new(InMemoryGraphWriter {
            state: Arc::clone(&self.state),
            tasks: Vec::new(),
            edges: Vec::new(),
        }))
    }

    async fn create_goal(&self, text: &str) -> Result<Goal> {
        let goal = Goal {
            id: Uuid::new_v4(),
            text: text.to_owned(),
            status: GoalStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.lock()?.goals.push(goal.clone());
        Ok(goal)
    }

    async fn get_goal(&self, goal_id: Uuid) -> Result<Option<Goal>> {
        Ok(self.lock()?.goals.iter().find(|g| g.id == goal_id).cloned())
    }

    async fn delete_goal(&self, goal_id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        if !state.has_goal(goal_id) {
            return Ok(false);
        }
        state.remove_tasks_where(|t| t.goal_id == goal_id);
        state.jobs.retain(|j| j.goal_id != goal_id);
        state.goals.retain(|g| g.id != goal_id);
        Ok(true)
    }

    async fn list_goals(&self, offset: i64, limit: i64) -> Result<Vec<GoalSummary>> {
        let state = self.lock()?;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let summaries = state
            .goals
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(|goal| {
                let tasks = state.tasks.iter().filter(|t| t.goal_id == goal.id);
                let (task_count, completed_tasks) = tasks.fold((0, 0), |(n, done), t| {
                    (n + 1, done + i64::from(t.status == TaskStatus::Completed))
                });
                GoalSummary {
                    id: goal.id,
                    text: goal.text.clone(),
                    status: goal.status,
                    created_at: goal.created_at,
                    task_count,
                    completed_tasks,
                }
            })
            .collect();
        Ok(summaries)
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        Ok(self.lock()?.tasks.iter().find(|t| t.id == task_id).cloned())
    }

    async fn list_tasks(&self, goal_id: Uuid) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .lock()?
            .tasks
            .iter()
            .filter(|t| t.goal_id == goal_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.position, t.created_at));
        Ok(tasks)
    }

    async fn delete_tasks(&self, goal_id: Uuid) -> Result<u64> {
        Ok(self.lock()?.remove_tasks_where(|t| t.goal_id == goal_id))
    }

    async fn list_edges(&self, goal_id: Uuid) -> Result<Vec<TaskDependency>> {
        Ok(self.lock()?.edges_of_goal(goal_id))
    }

    async fn insert_edge_checked(
        &self,
        goal_id: Uuid,
        edge: TaskDependency,
    ) -> Result<EdgeInsert> {
        let mut state = self.lock()?;
        if !state.has_goal(goal_id) {
            bail!("goal {goal_id} does not exist");
        }
        if edge.task_id == edge.depends_on {
            bail!("task {} cannot depend on itself", edge.task_id);
        }
        for id in [edge.task_id, edge.depends_on] {
            if !state.has_task(id) {
                bail!("task {id} does not exist");
            }
        }
        if state.edges.contains(&edge) {
            return Ok(EdgeInsert::AlreadyExists);
        }
        if has_cycle(&state.edges_of_goal(goal_id), edge.task_id, edge.depends_on) {
            return Ok(EdgeInsert::WouldCycle);
        }
        state.edges.push(edge);
        Ok(EdgeInsert::Inserted)
    }

    async fn create_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        let mut state = self.lock()?;
        if !state.has_goal(goal_id) {
            bail!("goal {goal_id} does not exist");
        }
        if state
            .jobs
            .iter()
            .any(|j| j.goal_id == goal_id && j.status.is_active())
        {
            return Ok(None);
        }
        let job = PlanJob {
            id: Uuid::new_v4(),
            goal_id,
            status: JobStatus::Queued,
            detail: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        state.jobs.push(job.clone());
        Ok(Some(job))
    }

    async fn transition_job(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == from)
        else {
            bail!("plan job {job_id} is not in state {from}; cannot move to {to}");
        };
        let now = Utc::now();
        job.status = to;
        if let Some(detail) = detail {
            job.detail = Some(detail.to_owned());
        }
        if to == JobStatus::Running {
            job.started_at = Some(now);
        }
        if !to.is_active() {
            job.finished_at = Some(now);
        }
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<PlanJob>> {
        Ok(self.lock()?.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn active_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        Ok(self
            .lock()?
            .jobs
            .iter()
            .rev()
            .find(|j| j.goal_id == goal_id && j.status.is_active())
            .cloned())
    }

    async fn latest_job(&self, goal_id: Uuid) -> Result<Option<PlanJob>> {
        Ok(self
            .lock()?
            .jobs
            .iter()
            .rev()
            .find(|j| j.goal_id == goal_id)
            .cloned())
    }
}
