//! Recovery of a structured plan from raw completion text.
//!
//! Parsing is a short pipeline of stages, each either total or failing with a
//! [`MalformedResponse`]:
//!
//! 1. [`strip_code_fence`] (total) removes a surrounding markdown fence.
//! 2. [`extract_json_object`] slices out the outermost `{...}` when the text
//!    does not already start with one.
//! 3. The slice is parsed as JSON and must carry a `tasks` array.
//! 4. Each entry is normalized into a [`TaskSpec`].
//!
//! A malformed response is a data-quality event, not a control-flow error:
//! callers route it to the fallback plan.

use serde_json::{Map, Value};
use thiserror::Error;

use super::{Plan, TaskSpec};

/// Why a completion could not be turned into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedResponse {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response is missing a `tasks` array")]
    MissingTasks,

    #[error("response contains no tasks")]
    NoTasks,

    #[error("task #{index} is not a JSON object")]
    InvalidTask { index: usize },

    #[error("task #{index} has no name")]
    MissingName { index: usize },

    #[error("task #{index} has an invalid `{field}` field")]
    InvalidField { index: usize, field: &'static str },
}

/// Parse raw completion text into a plan.
pub fn parse_plan_response(raw: &str) -> Result<Plan, MalformedResponse> {
    let unfenced = strip_code_fence(raw);
    let object = extract_json_object(unfenced)?;
    let document: Value =
        serde_json::from_str(object).map_err(|e| MalformedResponse::InvalidJson(e.to_string()))?;

    let entries = document
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or(MalformedResponse::MissingTasks)?;

    if entries.is_empty() {
        return Err(MalformedResponse::NoTasks);
    }

    let tasks = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| task_from_entry(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Plan { tasks })
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` marker and a trailing
/// ```` ``` ```` marker, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches([' ', '\t']);
        if text
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            text = &text[4..];
        }
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Slice out the JSON object embedded in `text`.
///
/// Text already starting with `{` is returned unchanged; otherwise the span
/// from the first `{` to the last `}` is returned.
pub fn extract_json_object(text: &str) -> Result<&str, MalformedResponse> {
    if text.starts_with('{') {
        return Ok(text);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(MalformedResponse::NoJsonObject),
    }
}

fn task_from_entry(index: usize, entry: &Value) -> Result<TaskSpec, MalformedResponse> {
    let fields = entry
        .as_object()
        .ok_or(MalformedResponse::InvalidTask { index })?;

    let name = match fields.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_owned(),
        _ => return Err(MalformedResponse::MissingName { index }),
    };

    let description = match present(fields, "description") {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(_) => {
            return Err(MalformedResponse::InvalidField {
                index,
                field: "description",
            });
        }
    };

    let duration_days = match present(fields, "duration_days") {
        None => 1,
        Some(value) => clamp_duration(value).ok_or(MalformedResponse::InvalidField {
            index,
            field: "duration_days",
        })?,
    };

    let depends_on = match present(fields, "depends_on") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(|dep| dep.trim().to_owned()))
            .collect::<Option<Vec<_>>>()
            .ok_or(MalformedResponse::InvalidField {
                index,
                field: "depends_on",
            })?,
        Some(_) => {
            return Err(MalformedResponse::InvalidField {
                index,
                field: "depends_on",
            });
        }
    };

    Ok(TaskSpec {
        name,
        description,
        duration_days,
        depends_on,
    })
}

/// A field that is present and not `null`.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|value| !value.is_null())
}

/// Numeric durations are clamped into `1..=u32::MAX`; fractions truncate.
fn clamp_duration(value: &Value) -> Option<u32> {
    let days = if let Some(days) = value.as_i64() {
        days
    } else if let Some(days) = value.as_u64() {
        i64::try_from(days).unwrap_or(i64::MAX)
    } else {
        // `as` saturates on out-of-range floats and maps NaN to 0.
        value.as_f64()?.trunc() as i64
    };

    Some(u32::try_from(days.max(1)).unwrap_or(u32::MAX))
}
