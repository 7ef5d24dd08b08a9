//! Deterministic single-task plan used when no model plan is available.

use super::{Plan, TaskSpec};

/// Prefix of the fallback task name.
pub const FALLBACK_NAME_PREFIX: &str = "Complete: ";

/// Fixed duration of the fallback task.
pub const FALLBACK_DURATION_DAYS: u32 = 7;

/// Fixed description of the fallback task.
pub const FALLBACK_DESCRIPTION: &str = "This task was created automatically because AI planning \
was unavailable. Break it down into smaller tasks manually.";

/// Goals longer than this many characters are shortened in the task name.
const MAX_GOAL_CHARS: usize = 100;
const TRUNCATED_GOAL_CHARS: usize = 97;

/// Build the fallback plan for a goal: exactly one task, no dependencies.
pub fn fallback_plan(goal_text: &str) -> Plan {
    let name = format!("{FALLBACK_NAME_PREFIX}{}", shorten_goal(goal_text));

    Plan {
        tasks: vec![TaskSpec {
            name,
            description: FALLBACK_DESCRIPTION.to_owned(),
            duration_days: FALLBACK_DURATION_DAYS,
            depends_on: Vec::new(),
        }],
    }
}

/// Counts characters, not bytes, so multi-byte goals never split a code point.
fn shorten_goal(goal_text: &str) -> String {
    if goal_text.chars().count() <= MAX_GOAL_CHARS {
        return goal_text.to_owned();
    }
    let mut short: String = goal_text.chars().take(TRUNCATED_GOAL_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_task_with_fixed_fields() {
        let plan = fallback_plan("Launch a mobile app");
        assert_eq!(plan.tasks.len(), 1);

        let task = &plan.tasks[0];
        assert_eq!(task.name, "Complete: Launch a mobile app");
        assert_eq!(task.description, FALLBACK_DESCRIPTION);
        assert_eq!(task.duration_days, 7);
        assert!(task.depends_on.is_empty());
    }

    #[test]
    fn long_goal_is_truncated_to_97_chars_plus_ellipsis() {
        let goal: String = ('a'..='z').cycle().take(150).collect();
        let plan = fallback_plan(&goal);
        let expected = format!("Complete: {}...", &goal[..97]);
        assert_eq!(plan.tasks[0].name, expected);
    }

    #[test]
    fn goal_of_exactly_100_chars_is_kept() {
        let goal = "x".repeat(100);
        let plan = fallback_plan(&goal);
        assert_eq!(plan.tasks[0].name, format!("Complete: {goal}"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let goal = "é".repeat(120);
        let name = &fallback_plan(&goal).tasks[0].name;
        assert!(name.ends_with("..."));
        assert_eq!(name.chars().count(), FALLBACK_NAME_PREFIX.len() + 97 + 3);
    }

    #[test]
    fn empty_goal_is_total() {
        let plan = fallback_plan("");
        assert_eq!(plan.tasks[0].name, "Complete: ");
    }

    #[test]
    fn deterministic() {
        assert_eq!(fallback_plan("same goal"), fallback_plan("same goal"));
    }
}
