//! Board domain types.
//!
//! Hierarchy: `Workspace` → `Board` → `TaskList` → `Task`, where tasks can nest
//! sub-tasks through `parent_id`. Every ordered record carries an integer `order`
//! that is dense (`0..N-1`) right after a reorder but may have gaps after deletes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BoardError, BoardResult};

/// Sub-task traversal stops at this depth.
pub const MAX_TASK_DEPTH: usize = 32;

/// Titles longer than this are rejected.
pub const MAX_TITLE_LEN: usize = 500;

/// A workspace owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub order: i64,
    pub created_at: String,
}

/// A list (column) on a board. Lists are the containers tasks are ordered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub list_id: Uuid,
    /// Parent task for sub-tasks. Always lives in the same list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub order: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a task about to be created. The store assigns `id` and `order`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn subtask_of(parent_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }
}

/// Partial update of a task's editable fields. Ordering fields are not editable here;
/// they only change through moves and order batches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// `Some(None)` clears the due date.
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn rename(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.labels.is_none()
            && self.due_date.is_none()
    }

    /// Apply the patch to a task in place after validating it.
    pub fn apply_to(&self, task: &mut Task) -> BoardResult<()> {
        if let Some(title) = &self.title {
            task.title = validate_title(title)?;
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(labels) = &self.labels {
            task.labels = normalize_labels(labels.clone());
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        Ok(())
    }
}

/// Distinguishes "field absent" from "field explicitly null" in JSON patches.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// A list together with its tasks in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListWithTasks {
    #[serde(flatten)]
    pub list: TaskList,
    pub tasks: Vec<Task>,
}

/// Everything needed to render a board: lists and tasks in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub lists: Vec<ListWithTasks>,
}

/// A task with the names of everything above it, used to prompt text generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub task: Task,
    pub list_title: String,
    pub board_name: String,
    pub workspace_name: String,
    pub workspace_slug: String,
}

/// Anything access control can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Workspace(Uuid),
    Board(Uuid),
    List(Uuid),
    Task(Uuid),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Workspace(id) => write!(f, "workspace {}", id),
            Resource::Board(id) => write!(f, "board {}", id),
            Resource::List(id) => write!(f, "list {}", id),
            Resource::Task(id) => write!(f, "task {}", id),
        }
    }
}

/// Trim and check a required title.
pub fn validate_title(title: &str) -> BoardResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(BoardError::MalformedInput(
            "Title cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(BoardError::MalformedInput(format!(
            "Title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Deduplicate and trim labels, preserving first occurrence order.
pub fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            parent_id: None,
            title: "Write docs".to_string(),
            order: 0,
            completed: false,
            labels: vec![],
            due_date: None,
            description: Some("old".to_string()),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_validate_title_trims_and_rejects_blank() {
        assert_eq!(validate_title("  Ship it ").unwrap(), "Ship it");
        assert!(matches!(
            validate_title("   "),
            Err(BoardError::MalformedInput(_))
        ));
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_title(&long).is_err());
    }

    #[test]
    fn test_normalize_labels_deduplicates_case_insensitively() {
        let labels = vec![
            " Red ".to_string(),
            "red".to_string(),
            "".to_string(),
            "Blue".to_string(),
        ];
        assert_eq!(normalize_labels(labels), vec!["Red", "Blue"]);
    }

    #[test]
    fn test_patch_clears_description_with_explicit_null() {
        let patch: TaskPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(patch.description, Some(None));

        let mut task = sample_task();
        patch.apply_to(&mut task).unwrap();
        assert_eq!(task.description, None);
        assert_eq!(task.title, "Write docs");
    }

    #[test]
    fn test_patch_absent_fields_leave_task_untouched() {
        let patch: TaskPatch = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert!(patch.description.is_none());

        let mut task = sample_task();
        patch.apply_to(&mut task).unwrap();
        assert!(task.completed);
        assert_eq!(task.description.as_deref(), Some("old"));
    }

    #[test]
    fn test_patch_rejects_blank_title() {
        let mut task = sample_task();
        assert!(TaskPatch::rename(" ").apply_to(&mut task).is_err());
        assert_eq!(task.title, "Write docs");
    }
}
