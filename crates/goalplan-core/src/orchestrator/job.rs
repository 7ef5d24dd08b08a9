//! Background plan-generation jobs.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use goalplan_db::models::{JobStatus, PlanJob};

use super::{PlanSource, PlanningOrchestrator};
use crate::graph::DependencyGraphBuilder;
use crate::store::PlanStore;

/// A job that has been recorded as `queued` and spawned.
///
/// Dropping the handle detaches the job; awaiting it yields the final
/// status.
#[derive(Debug)]
pub struct ScheduledJob {
    pub job_id: Uuid,
    pub handle: JoinHandle<JobStatus>,
}

impl PlanningOrchestrator {
    /// Run a job that was recorded as `queued` on the tokio runtime.
    ///
    /// Returns immediately; the caller does not wait for generation.
    pub fn schedule(
        self: &Arc<Self>,
        store: Arc<dyn PlanStore>,
        job: &PlanJob,
        goal_text: String,
    ) -> ScheduledJob {
        tracing::info!(goal_id = %job.goal_id, job_id = %job.id, "plan generation queued");

        let orchestrator = Arc::clone(self);
        let job_id = job.id;
        let goal_id = job.goal_id;
        let handle = tokio::spawn(async move {
            run_generation_job(&orchestrator, store.as_ref(), job_id, goal_id, &goal_text).await
        });

        ScheduledJob { job_id, handle }
    }
}

/// Run one generation job to completion and return its final status.
///
/// `queued` → `running` → `succeeded` | `fallback_used` | `failed`. Only a
/// store failure leads to `failed`; nothing is persisted in that case.
pub async fn run_generation_job(
    orchestrator: &PlanningOrchestrator,
    store: &dyn PlanStore,
    job_id: Uuid,
    goal_id: Uuid,
    goal_text: &str,
) -> JobStatus {
    if let Err(e) = store
        .transition_job(job_id, JobStatus::Queued, JobStatus::Running, None)
        .await
    {
        tracing::error!(job_id = %job_id, error = %e, "failed to start plan job");
        return JobStatus::Failed;
    }

    let generated = orchestrator.generate_plan(goal_text).await;
    let outcome = DependencyGraphBuilder::new(store)
        .materialize(goal_id, &generated.plan)
        .await;

    let (status, detail) = match outcome {
        Ok(materialized) => match &generated.source {
            PlanSource::Model => {
                tracing::info!(
                    goal_id = %goal_id,
                    job_id = %job_id,
                    tasks = materialized.tasks.len(),
                    edges = materialized.edges.len(),
                    "plan generated"
                );
                (
                    JobStatus::Succeeded,
                    format!(
                        "{} task(s), {} edge(s), {} dropped dependency reference(s)",
                        materialized.tasks.len(),
                        materialized.edges.len(),
                        materialized.dropped.len()
                    ),
                )
            }
            PlanSource::Fallback(reason) => {
                tracing::warn!(
                    goal_id = %goal_id,
                    job_id = %job_id,
                    reason = %reason,
                    "fallback plan persisted"
                );
                (JobStatus::FallbackUsed, reason.to_string())
            }
        },
        Err(e) => {
            tracing::error!(
                goal_id = %goal_id,
                job_id = %job_id,
                error = %e,
                "failed to persist plan"
            );
            (JobStatus::Failed, format!("{e:#}"))
        }
    };

    if let Err(e) = store
        .transition_job(job_id, JobStatus::Running, status, Some(&detail))
        .await
    {
        tracing::error!(job_id = %job_id, error = %e, "failed to record plan job outcome");
    }

    status
}
