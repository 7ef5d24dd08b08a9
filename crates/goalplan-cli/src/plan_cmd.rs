//! `goalplan plan <goal>`: dry-run plan generation.
//!
//! Generates a plan, materializes it into an in-memory store and prints the
//! resulting graph with its schedule as JSON. Nothing is written to the
//! database.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::{Value, json};
use uuid::Uuid;

use goalplan_core::graph::{DependencyGraphBuilder, schedule, total_days};
use goalplan_core::orchestrator::{PlanSource, PlanningOrchestrator};
use goalplan_core::plan::{Plan, fallback_plan};
use goalplan_core::store::{InMemoryPlanStore, PlanStore};

/// Run the dry run. Without an orchestrator the fallback plan is used.
pub async fn run_plan(goal_text: &str, orchestrator: Option<&PlanningOrchestrator>) -> Result<()> {
    let (plan, source) = match orchestrator {
        Some(orchestrator) => {
            let generated = orchestrator.generate_plan(goal_text).await;
            (generated.plan, describe_source(&generated.source))
        }
        None => (fallback_plan(goal_text), "offline".to_string()),
    };

    let document = build_document(goal_text, &plan, &source).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn describe_source(source: &PlanSource) -> String {
    match source {
        PlanSource::Model => "model".to_string(),
        PlanSource::Fallback(reason) => format!("fallback ({reason})"),
    }
}

/// Materialize `plan` in memory and describe the result as JSON.
async fn build_document(goal_text: &str, plan: &Plan, source: &str) -> Result<Value> {
    let store = InMemoryPlanStore::new();
    let goal = store.create_goal(goal_text).await?;
    let materialized = DependencyGraphBuilder::new(&store)
        .materialize(goal.id, plan)
        .await?;
    let scheduled = schedule(&materialized.tasks, &materialized.edges)?;

    let names: HashMap<Uuid, &str> = materialized
        .tasks
        .iter()
        .map(|t| (t.id, t.name.as_str()))
        .collect();

    let tasks: Vec<Value> = materialized
        .tasks
        .iter()
        .zip(&scheduled)
        .map(|(task, slot)| {
            let depends_on: Vec<&str> = materialized
                .edges
                .iter()
                .filter(|e| e.task_id == task.id)
                .filter_map(|e| names.get(&e.depends_on).copied())
                .collect();
            json!({
                "id": task.id,
                "name": task.name,
                "description": task.description,
                "duration_days": task.duration_days,
                "depends_on": depends_on,
                "start_day": slot.start_day,
                "end_day": slot.end_day,
            })
        })
        .collect();

    Ok(json!({
        "goal": goal_text,
        "source": source,
        "total_days": total_days(&scheduled),
        "tasks": tasks,
        "dropped_dependencies": materialized.dropped,
    }))
}

#[cfg(test)]
mod tests {
    use goalplan_core::plan::TaskSpec;

    use super::*;

    fn spec(name: &str, days: u32, deps: &[&str]) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            description: String::new(),
            duration_days: days,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn offline_document_holds_fallback_task() {
        let doc = build_document("Learn Rust", &fallback_plan("Learn Rust"), "offline")
            .await
            .unwrap();
        assert_eq!(doc["source"], "offline");
        assert_eq!(doc["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(doc["tasks"][0]["name"], "Complete: Learn Rust");
        assert_eq!(doc["tasks"][0]["duration_days"], 7);
        assert_eq!(doc["total_days"], 7);
    }

    #[tokio::test]
    async fn document_lists_dependencies_and_schedule() {
        let plan = Plan {
            tasks: vec![
                spec("Design", 3, &[]),
                spec("Build", 10, &["Design", "Budget"]),
                spec("Launch", 1, &["Build"]),
            ],
        };
        let doc = build_document("Launch a mobile app", &plan, "model").await.unwrap();

        assert_eq!(doc["tasks"][1]["depends_on"], json!(["Design"]));
        assert_eq!(doc["tasks"][2]["start_day"], 13);
        assert_eq!(doc["total_days"], 14);
        assert_eq!(doc["dropped_dependencies"][0]["depends_on"], "Budget");
        assert_eq!(doc["dropped_dependencies"][0]["reason"], "unresolved");
    }
}
