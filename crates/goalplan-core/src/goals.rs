//! Goal lifecycle triggers: create, regenerate and delete.
//!
//! Creating a goal and regenerating its tasks each schedule one background
//! generation job. A goal holds at most one queued or running job. The slot
//! is reserved by the store in one atomic write before any task is deleted,
//! so concurrent regenerations cannot both clear and refill the same goal.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use goalplan_db::models::{Goal, JobStatus, PlanJob};

use crate::orchestrator::{PlanningOrchestrator, ScheduledJob};
use crate::store::PlanStore;

#[derive(Debug, Error)]
pub enum GoalError {
    #[error("goal {0} not found")]
    NotFound(Uuid),

    /// `job_id` is `None` when the blocking job finished before it could be
    /// looked up.
    #[error("goal {goal_id} already has a plan job in progress")]
    JobInFlight {
        goal_id: Uuid,
        job_id: Option<Uuid>,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Owns goal lifecycle operations over a shared store.
#[derive(Clone)]
pub struct GoalService {
    store: Arc<dyn PlanStore>,
    orchestrator: Arc<PlanningOrchestrator>,
}

impl GoalService {
    pub fn new(store: Arc<dyn PlanStore>, orchestrator: Arc<PlanningOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    pub fn store(&self) -> &Arc<dyn PlanStore> {
        &self.store
    }

    /// Insert a goal and schedule plan generation for it.
    pub async fn create_goal(&self, text: &str) -> Result<(Goal, ScheduledJob), GoalError> {
        let goal = self.store.create_goal(text).await?;
        tracing::info!(goal_id = %goal.id, "goal created");
        let job = self.reserve_job(goal.id).await?;
        let scheduled = self
            .orchestrator
            .schedule(Arc::clone(&self.store), &job, goal.text.clone());
        Ok((goal, scheduled))
    }

    /// Delete all tasks of the goal and schedule a fresh generation job.
    pub async fn regenerate_tasks(&self, goal_id: Uuid) -> Result<ScheduledJob, GoalError> {
        let goal = self
            .store
            .get_goal(goal_id)
            .await?
            .ok_or(GoalError::NotFound(goal_id))?;

        let job = self.reserve_job(goal_id).await?;

        let removed = match self.store.delete_tasks(goal_id).await {
            Ok(removed) => removed,
            Err(e) => {
                let detail = format!("failed to clear tasks: {e:#}");
                if let Err(release) = self
                    .store
                    .transition_job(job.id, JobStatus::Queued, JobStatus::Failed, Some(&detail))
                    .await
                {
                    tracing::error!(
                        job_id = %job.id,
                        error = %release,
                        "failed to release plan job"
                    );
                }
                return Err(e.into());
            }
        };
        tracing::info!(goal_id = %goal_id, removed, "tasks cleared for regeneration");

        Ok(self
            .orchestrator
            .schedule(Arc::clone(&self.store), &job, goal.text))
    }

    async fn reserve_job(&self, goal_id: Uuid) -> Result<PlanJob, GoalError> {
        if let Some(job) = self.store.create_job(goal_id).await? {
            return Ok(job);
        }
        let active = self.store.active_job(goal_id).await?;
        Err(GoalError::JobInFlight {
            goal_id,
            job_id: active.map(|job| job.id),
        })
    }

    /// Delete a goal with its tasks, edges and jobs.
    pub async fn delete_goal(&self, goal_id: Uuid) -> Result<(), GoalError> {
        if !self.store.delete_goal(goal_id).await? {
            return Err(GoalError::NotFound(goal_id));
        }
        tracing::info!(goal_id = %goal_id, "goal deleted");
        Ok(())
    }
}
