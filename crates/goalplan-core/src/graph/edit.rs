//! Manual insertion of a single dependency edge.

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use goalplan_db::models::TaskDependency;

use crate::store::{EdgeInsert, PlanStore};

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("tasks {task_id} and {depends_on} belong to different goals")]
    CrossGoal { task_id: Uuid, depends_on: Uuid },

    #[error("task {0} cannot depend on itself")]
    SelfDependency(Uuid),

    #[error("making {task_id} depend on {depends_on} would create a cycle")]
    WouldCycle { task_id: Uuid, depends_on: Uuid },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Record that `task_id` depends on `depends_on`.
///
/// Both tasks must exist and belong to the same goal, and the new edge must
/// not close a cycle. Returns `false` if the edge already existed.
pub async fn add_dependency(
    store: &dyn PlanStore,
    task_id: Uuid,
    depends_on: Uuid,
) -> Result<bool, DependencyError> {
    if task_id == depends_on {
        return Err(DependencyError::SelfDependency(task_id));
    }

    let task = store
        .get_task(task_id)
        .await?
        .ok_or(DependencyError::TaskNotFound(task_id))?;
    let prerequisite = store
        .get_task(depends_on)
        .await?
        .ok_or(DependencyError::TaskNotFound(depends_on))?;

    if task.goal_id != prerequisite.goal_id {
        return Err(DependencyError::CrossGoal {
            task_id,
            depends_on,
        });
    }

    let edge = TaskDependency {
        task_id,
        depends_on,
    };
    match store.insert_edge_checked(task.goal_id, edge).await? {
        EdgeInsert::Inserted => {
            info!(%task_id, %depends_on, goal_id = %task.goal_id, "added task dependency");
            Ok(true)
        }
        EdgeInsert::AlreadyExists => Ok(false),
        EdgeInsert::WouldCycle => Err(DependencyError::WouldCycle {
            task_id,
            depends_on,
        }),
    }
}
