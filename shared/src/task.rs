use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::{Constraint, FieldRule, Validate, ValidationError};

pub const TITLE_MAX_LENGTH: usize = 255;
pub const DESCRIPTION_MAX_LENGTH: usize = 1000;

const CREATE_TITLE: &[Constraint] = &[
    Constraint::Required,
    Constraint::MinLength(1),
    Constraint::MaxLength(TITLE_MAX_LENGTH),
];
const UPDATE_TITLE: &[Constraint] = &[
    Constraint::MinLength(1),
    Constraint::MaxLength(TITLE_MAX_LENGTH),
];
const DESCRIPTION: &[Constraint] = &[Constraint::MaxLength(DESCRIPTION_MAX_LENGTH)];
const STATUS: &[Constraint] = &[Constraint::OneOf(TaskStatus::NAMES)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const NAMES: &'static [&'static str] = &["pending", "in_progress", "completed"];

    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Current time at the resolution every storage backend keeps.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: String, description: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the fields present in `patch` and stamps `updated_at`.
    ///
    /// `updated_at` always moves forward, even when `now` has not.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now.max(self.updated_at + Duration::microseconds(1));
    }
}

/// A validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Validate for CreateTaskRequest {
    fn rules(&self) -> Vec<FieldRule<'_>> {
        vec![
            FieldRule::new("Title", self.title.as_deref(), CREATE_TITLE),
            FieldRule::new("Description", self.description.as_deref(), DESCRIPTION),
        ]
    }
}

impl CreateTaskRequest {
    /// Validates the request and builds a fresh `pending` task from it.
    pub fn into_task(self, now: DateTime<Utc>) -> Result<Task, ValidationError> {
        self.validate()?;
        Ok(Task::new(
            self.title.unwrap_or_default(),
            self.description.unwrap_or_default(),
            now,
        ))
    }
}

/// Update payload. JSON `null` and a missing key both mean "unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl Validate for UpdateTaskRequest {
    fn rules(&self) -> Vec<FieldRule<'_>> {
        vec![
            FieldRule::new("Title", self.title.as_deref(), UPDATE_TITLE),
            FieldRule::new("Description", self.description.as_deref(), DESCRIPTION),
            FieldRule::new("Status", self.status.as_deref(), STATUS),
        ]
    }
}

impl TryFrom<UpdateTaskRequest> for TaskPatch {
    type Error = ValidationError;

    fn try_from(request: UpdateTaskRequest) -> Result<Self, Self::Error> {
        request.validate()?;
        let status = request
            .status
            .map(|status| status.parse::<TaskStatus>())
            .transpose()
            .map_err(|_| {
                ValidationError::new(
                    "Status",
                    format!("must be one of: {}", TaskStatus::NAMES.join(" ")),
                )
            })?;

        Ok(TaskPatch {
            title: request.title,
            description: request.description,
            status,
        })
    }
}

/// Wire shape of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn stored_task() -> Task {
        let mut task = Task::new(
            "Write report".to_string(),
            "Quarterly numbers".to_string(),
            timestamp_now(),
        );
        task.status = TaskStatus::InProgress;
        task
    }

    #[rstest]
    #[case(None, "Title is required")]
    #[case(Some(String::new()), "Title is required")]
    #[case(Some("x".repeat(256)), "Title must be at most 255 characters")]
    fn create_rejects_bad_titles(#[case] title: Option<String>, #[case] expected: &str) {
        let request = CreateTaskRequest {
            title,
            description: None,
        };

        let error = request.into_task(timestamp_now()).unwrap_err();
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn create_rejects_long_description() {
        let request = CreateTaskRequest {
            title: Some("ok".to_string()),
            description: Some("d".repeat(1001)),
        };

        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "Description must be at most 1000 characters"
        );
    }

    #[test]
    fn create_builds_pending_task_with_equal_timestamps() {
        let now = timestamp_now();
        let request = CreateTaskRequest {
            title: Some("Buy milk".to_string()),
            description: None,
        };

        let task = request.into_task(now).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.description, "");
        assert_eq!(task.created_at, now);
        assert_eq!(task.updated_at, now);
    }

    #[test]
    fn create_ignores_status_in_payload() {
        let request: CreateTaskRequest =
            serde_json::from_str(r#"{"title":"a","status":"completed"}"#).unwrap();

        let task = request.into_task(timestamp_now()).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[rstest]
    #[case(r#"{"title":""}"#, "Title must be at least 1 characters")]
    #[case(r#"{"status":"done"}"#, "Status must be one of: pending in_progress completed")]
    #[case(r#"{"title":"ok","status":"Pending"}"#, "Status must be one of: pending in_progress completed")]
    fn update_rejects_invalid_fields(#[case] body: &str, #[case] expected: &str) {
        let request: UpdateTaskRequest = serde_json::from_str(body).unwrap();

        let error = TaskPatch::try_from(request).unwrap_err();
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn update_treats_null_as_absent() {
        let request: UpdateTaskRequest =
            serde_json::from_str(r#"{"title":null,"description":null}"#).unwrap();

        assert_eq!(TaskPatch::try_from(request).unwrap(), TaskPatch::default());
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut task = stored_task();
        let before = task.clone();

        task.apply(
            TaskPatch {
                status: Some(TaskStatus::Completed),
                ..TaskPatch::default()
            },
            timestamp_now(),
        );

        assert_eq!(task.title, before.title);
        assert_eq!(task.description, before.description);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.created_at, before.created_at);
    }

    #[test]
    fn apply_allows_any_status_transition() {
        let mut task = stored_task();
        task.status = TaskStatus::Completed;

        task.apply(
            TaskPatch {
                status: Some(TaskStatus::Pending),
                ..TaskPatch::default()
            },
            timestamp_now(),
        );

        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn apply_moves_updated_at_forward_even_with_a_stale_clock() {
        let mut task = stored_task();
        let previous = task.updated_at;

        task.apply(TaskPatch::default(), previous - Duration::seconds(5));

        assert!(task.updated_at > previous);
        assert!(task.created_at <= task.updated_at);
    }

    #[test]
    fn status_round_trips_through_its_name() {
        for name in TaskStatus::NAMES {
            let status: TaskStatus = name.parse().unwrap();
            assert_eq!(status.as_str(), *name);
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{name}\""));
        }
    }
}
