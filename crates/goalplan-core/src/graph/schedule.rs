//! Earliest-start scheduling over a task graph.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use goalplan_db::models::{Task, TaskDependency};

/// Day offsets of a task relative to the start of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledTask {
    pub task_id: Uuid,
    /// First day the task can start (0-based).
    pub start_day: u32,
    /// Day the task finishes: `start_day + duration_days`.
    pub end_day: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("task graph contains a cycle through {remaining} task(s)")]
    Cycle { remaining: usize },
}

/// Compute earliest start and end days in topological order (Kahn).
///
/// A task starts when its last prerequisite ends. Edges referring to tasks
/// outside `tasks` are ignored. The output follows `tasks` order.
pub fn schedule(tasks: &[Task], edges: &[TaskDependency]) -> Result<Vec<ScheduledTask>, ScheduleError> {
    let position: HashMap<Uuid, usize> = tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

    let mut in_degree = vec![0usize; tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for edge in edges {
        if let (Some(&task), Some(&prereq)) = (position.get(&edge.task_id), position.get(&edge.depends_on)) {
            in_degree[task] += 1;
            dependents[prereq].push(task);
        }
    }

    let mut start = vec![0u32; tasks.len()];
    let mut end = vec![0u32; tasks.len()];
    let mut ready: VecDeque<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut visited = 0;

    while let Some(i) = ready.pop_front() {
        visited += 1;
        let duration = u32::try_from(tasks[i].duration_days.max(1)).unwrap_or(1);
        end[i] = start[i].saturating_add(duration);
        for &next in &dependents[i] {
            start[next] = start[next].max(end[i]);
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if visited != tasks.len() {
        return Err(ScheduleError::Cycle {
            remaining: tasks.len() - visited,
        });
    }

    Ok(tasks
        .iter()
        .enumerate()
        .map(|(i, t)| ScheduledTask {
            task_id: t.id,
            start_day: start[i],
            end_day: end[i],
        })
        .collect())
}

/// Total plan length in days.
pub fn total_days(scheduled: &[ScheduledTask]) -> u32 {
    scheduled.iter().map(|s| s.end_day).max().unwrap_or(0)
}
