//! Turning a [`Plan`] into persisted tasks and dependency edges.
//!
//! Materialization has two phases inside one store transaction:
//!
//! 1. **Nodes**: one task per spec, in plan order, while building a
//!    name → id map. Later specs overwrite earlier ones with the same name,
//!    so a dependency on a duplicated name resolves to the last such task.
//! 2. **Edges**: each `depends_on` name is looked up in the map. Unknown
//!    names are dropped. So is any edge that would close a cycle, which
//!    keeps every persisted graph acyclic.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use goalplan_db::models::{Task, TaskDependency};

use super::cycle::DependencyIndex;
use crate::plan::Plan;
use crate::store::PlanStore;

/// Why a `depends_on` reference did not become an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No task in the plan has that name.
    Unresolved,
    /// The edge would make the graph cyclic (including self-dependencies).
    WouldCycle,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => f.write_str("unresolved"),
            Self::WouldCycle => f.write_str("would_cycle"),
        }
    }
}

/// A dependency reference that was skipped during materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedDependency {
    pub task: String,
    pub depends_on: String,
    pub reason: DropReason,
}

/// Result of materializing a plan.
#[derive(Debug, Clone)]
pub struct MaterializedPlan {
    pub tasks: Vec<Task>,
    pub edges: Vec<TaskDependency>,
    pub dropped: Vec<DroppedDependency>,
}

/// Resolve the plan's dependency names against the tasks created for it.
///
/// `tasks[i]` must be the task created for `plan.tasks[i]`. Duplicate edges
/// collapse into one.
pub fn resolve_edges(plan: &Plan, tasks: &[Task]) -> (Vec<TaskDependency>, Vec<DroppedDependency>) {
    let name_to_id: HashMap<&str, Uuid> = plan
        .tasks
        .iter()
        .zip(tasks)
        .map(|(spec, task)| (spec.name.as_str(), task.id))
        .collect();

    let mut index = DependencyIndex::new();
    let mut edges = Vec::new();
    let mut dropped = Vec::new();

    for (spec, task) in plan.tasks.iter().zip(tasks) {
        for dep_name in &spec.depends_on {
            let reason = match name_to_id.get(dep_name.as_str()) {
                None => DropReason::Unresolved,
                Some(&target) => {
                    let edge = TaskDependency {
                        task_id: task.id,
                        depends_on: target,
                    };
                    if edges.contains(&edge) {
                        continue;
                    }
                    if index.would_cycle(task.id, target) {
                        DropReason::WouldCycle
                    } else {
                        index.insert(edge);
                        edges.push(edge);
                        continue;
                    }
                }
            };
            warn!(
                task = %spec.name,
                depends_on = %dep_name,
                %reason,
                "dropping task dependency"
            );
            dropped.push(DroppedDependency {
                task: spec.name.clone(),
                depends_on: dep_name.clone(),
                reason,
            });
        }
    }

    (edges, dropped)
}

/// Persists plans as task graphs through a [`PlanStore`].
pub struct DependencyGraphBuilder<'a> {
    store: &'a dyn PlanStore,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(store: &'a dyn PlanStore) -> Self {
        Self { store }
    }

    /// Create the plan's tasks and resolvable edges for `goal_id`.
    ///
    /// Nodes and edges are committed together; on error nothing is
    /// persisted.
    pub async fn materialize(&self, goal_id: Uuid, plan: &Plan) -> Result<MaterializedPlan> {
        if plan.tasks.is_empty() {
            bail!("refusing to materialize an empty plan for goal {goal_id}");
        }

        let mut writer = self.store.begin_graph().await?;
        let tasks = writer.create_tasks(goal_id, &plan.tasks).await?;
        if tasks.len() != plan.tasks.len() {
            bail!(
                "store created {} tasks for a plan of {}",
                tasks.len(),
                plan.tasks.len()
            );
        }

        let (edges, dropped) = resolve_edges(plan, &tasks);
        writer.create_edges(&edges).await?;
        writer.commit().await?;

        debug!(
            %goal_id,
            tasks = tasks.len(),
            edges = edges.len(),
            dropped = dropped.len(),
            "materialized plan"
        );

        Ok(MaterializedPlan {
            tasks,
            edges,
            dropped,
        })
    }
}
