use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Archived,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        };
        f.write_str(s)
    }
}

impl FromStr for GoalStatus {
    type Err = GoalStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            other => Err(GoalStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`GoalStatus`] string.
#[derive(Debug, Clone)]
pub struct GoalStatusParseError(pub String);

impl fmt::Display for GoalStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid goal status: {:?}", self.0)
    }
}

impl std::error::Error for GoalStatusParseError {}

// ---------------------------------------------------------------------------

/// Status of a generated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Lifecycle of a background plan-generation job.
///
/// `queued -> running -> {succeeded | fallback_used | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    /// The model produced a usable plan and it was persisted.
    Succeeded,
    /// The deterministic fallback plan was persisted instead.
    FallbackUsed,
    /// Nothing was persisted (store failure).
    Failed,
}

impl JobStatus {
    /// Whether the job has not yet reached a terminal state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::FallbackUsed => "fallback_used",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = JobStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "fallback_used" => Ok(Self::FallbackUsed),
            "failed" => Ok(Self::Failed),
            other => Err(JobStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`JobStatus`] string.
#[derive(Debug, Clone)]
pub struct JobStatusParseError(pub String);

impl fmt::Display for JobStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid job status: {:?}", self.0)
    }
}

impl std::error::Error for JobStatusParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A user-supplied objective that plans are generated for.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub text: String,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A goal together with task progress counters, for list views.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GoalSummary {
    pub id: Uuid,
    pub text: String,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub task_count: i64,
    pub completed_tasks: i64,
}

/// A persisted task belonging to a goal.
///
/// `position` preserves the order of the plan the task was generated from;
/// every task of one plan shares the same transaction timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub duration_days: i32,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// An edge in the task dependency DAG: `task_id` depends on `depends_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct TaskDependency {
    pub task_id: Uuid,
    pub depends_on: Uuid,
}

/// A background plan-generation job for a goal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanJob {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub status: JobStatus,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
