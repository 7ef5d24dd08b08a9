//! Instruction payload sent to the completion provider.

/// Smallest number of tasks the model is asked for.
pub const MIN_TASKS: usize = 3;
/// Largest number of tasks the model is asked for.
pub const MAX_TASKS: usize = 8;

/// System message: constrains the model to bare JSON output.
pub const SYSTEM_PROMPT: &str = "You are a professional project manager. \
Always respond with valid JSON only. \
Do not include any explanatory text before or after the JSON.";

/// The system/user message pair for one planning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningPrompt {
    pub system: String,
    pub user: String,
}

/// Build the planning prompt for a goal.
///
/// Deterministic: the same goal text always yields the same prompt. The goal
/// is embedded verbatim, including when it is empty.
pub fn build_prompt(goal_text: &str) -> PlanningPrompt {
    let user = format!(
        r#"You are an expert project manager. Break the user's goal down into actionable tasks with clear dependencies and realistic time estimates.

INSTRUCTIONS:
1. Split the goal below into {MIN_TASKS}-{MAX_TASKS} concrete, actionable tasks.
2. Make every task specific, measurable and achievable.
3. Estimate a realistic duration in whole days for each task (minimum 1 day).
4. List the prerequisites of each task: the tasks that must finish before it can start.
5. Order the tasks along a logical path that ends with the goal achieved.
6. Reply with valid JSON only, with no text before or after it.

GOAL: {goal_text}

Reply with JSON of exactly this shape:
{{
  "tasks": [
    {{
      "name": "Specific, actionable task name",
      "description": "What needs to be done",
      "duration_days": 3,
      "depends_on": ["Name of a prerequisite task"]
    }}
  ]
}}

RULES:
- Every entry in "depends_on" must exactly match the "name" of another task.
- Use an empty array [] for tasks without prerequisites.
- Include only tasks needed to reach the goal.
- "duration_days" is an integer of at least 1.
- The response must be valid JSON only.

JSON response:"#
    );

    PlanningPrompt {
        system: SYSTEM_PROMPT.to_owned(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_deterministic() {
        assert_eq!(build_prompt("Launch a mobile app"), build_prompt("Launch a mobile app"));
    }

    #[test]
    fn prompt_embeds_goal_and_constraints() {
        let prompt = build_prompt("Learn Rust in a month");
        assert!(prompt.user.contains("GOAL: Learn Rust in a month\n"));
        assert!(prompt.user.contains("3-8 concrete"));
        assert!(prompt.user.contains("minimum 1 day"));
        assert!(prompt.user.contains("\"depends_on\""));
        assert!(prompt.user.contains("exactly match the \"name\""));
        assert!(prompt.system.contains("JSON only"));
    }

    #[test]
    fn prompt_schema_example_is_valid_json() {
        let prompt = build_prompt("x");
        let start = prompt.user.find("{\n").expect("schema example");
        let end = prompt.user.rfind('}').expect("schema example end");
        let example: serde_json::Value =
            serde_json::from_str(&prompt.user[start..=end]).expect("example should parse");
        assert!(example["tasks"].is_array());
    }

    #[test]
    fn empty_goal_still_builds_prompt() {
        let prompt = build_prompt("");
        assert!(prompt.user.contains("GOAL: \n"));
    }
}
