//! End-to-end plan generation.
//!
//! [`PlanningOrchestrator::generate_plan`] runs prompt → completion → parse
//! and falls back to the single-task plan whenever the provider fails or
//! returns something unusable, so it always yields a plan. The [`job`]
//! submodule runs generation plus materialization as a detached background
//! job with a persisted status record.

pub mod job;

use std::fmt;

use crate::completion::{CompletionClient, CompletionError};
use crate::plan::{MalformedResponse, Plan, build_prompt, fallback_plan, parse_plan_response};

pub use job::{ScheduledJob, run_generation_job};

/// Why the fallback plan was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The provider answered, but not with a usable plan.
    Malformed(MalformedResponse),
    /// The provider could not be reached (retries exhausted or auth failure).
    Unavailable(CompletionError),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed response: {e}"),
            Self::Unavailable(e) => write!(f, "service unavailable: {e}"),
        }
    }
}

/// Where a generated plan came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    Model,
    Fallback(FallbackReason),
}

impl PlanSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// A plan together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPlan {
    pub plan: Plan,
    pub source: PlanSource,
}

/// Composes prompt building, the completion client, the response parser and
/// the fallback generator.
#[derive(Debug, Clone)]
pub struct PlanningOrchestrator {
    client: CompletionClient,
}

impl PlanningOrchestrator {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Generate a plan for the goal. Never fails.
    pub async fn generate_plan(&self, goal_text: &str) -> GeneratedPlan {
        let prompt = build_prompt(goal_text);

        let reason = match self.client.call(&prompt).await {
            Ok(raw) => match parse_plan_response(&raw) {
                Ok(plan) => {
                    tracing::debug!(tasks = plan.tasks.len(), "parsed plan from completion");
                    return GeneratedPlan {
                        plan,
                        source: PlanSource::Model,
                    };
                }
                Err(malformed) => FallbackReason::Malformed(malformed),
            },
            Err(err) => FallbackReason::Unavailable(err),
        };

        tracing::warn!(reason = %reason, "using fallback plan");
        GeneratedPlan {
            plan: fallback_plan(goal_text),
            source: PlanSource::Fallback(reason),
        }
    }
}
