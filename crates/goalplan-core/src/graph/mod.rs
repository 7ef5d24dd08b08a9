//! Task dependency graph: cycle guard, plan materialization, manual edge
//! insertion and earliest-start scheduling.

pub mod cycle;
pub mod edit;
pub mod materialize;
pub mod schedule;

pub use cycle::{DependencyIndex, has_cycle};
pub use edit::{DependencyError, add_dependency};
pub use materialize::{
    DependencyGraphBuilder, DropReason, DroppedDependency, MaterializedPlan, resolve_edges,
};
pub use schedule::{ScheduleError, ScheduledTask, schedule, total_days};
