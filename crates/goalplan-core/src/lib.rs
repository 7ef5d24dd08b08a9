//! Goal-to-plan generation: prompt construction, resilient completion calls,
//! response recovery, deterministic fallback, and dependency-graph
//! materialization.

pub mod completion;
pub mod goals;
pub mod graph;
pub mod orchestrator;
pub mod plan;
pub mod store;
