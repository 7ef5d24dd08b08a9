//! Plan types and the pure stages of plan generation: prompt construction,
//! response parsing and the fallback plan.

pub mod fallback;
pub mod parser;
pub mod prompt;

use serde::{Deserialize, Deserializer, Serialize};

pub use fallback::{FALLBACK_DURATION_DAYS, fallback_plan};
pub use parser::{MalformedResponse, parse_plan_response};
pub use prompt::{PlanningPrompt, build_prompt};

/// A task as proposed by the model (or the fallback), before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Raised to 1 when deserialized or stored.
    #[serde(deserialize_with = "at_least_one_day")]
    pub duration_days: u32,
    /// Names of prerequisite tasks within the same plan.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl TaskSpec {
    /// Duration as stored in the database, never below 1.
    pub fn duration_days_i32(&self) -> i32 {
        i32::try_from(self.duration_days.max(1)).unwrap_or(i32::MAX)
    }
}

fn at_least_one_day<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u32::deserialize(deserializer)?.max(1))
}

/// An ordered list of task specs generated for one goal.
///
/// Names are expected, but not guaranteed, to be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<TaskSpec>,
}
