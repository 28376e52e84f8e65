//! Task domain model.
//!
//! # Responsibility
//! - Define the validated task text shared by both lists.
//! - Name the two persisted lists and their storage keys.
//! - Provide the immutable `TaskLists` snapshot handed to readers.
//!
//! # Invariants
//! - A `Task` is never blank and never carries surrounding whitespace.
//! - Tasks created through `Task::new_bounded` hold at most `MAX_TASK_CHARS`.
//! - A task has no identity beyond its text and its position in a list.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for newly added task text, counted in chars.
pub const MAX_TASK_CHARS: usize = 36;

/// Validation errors for task text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Text is empty or whitespace only.
    Blank,
    /// Trimmed text exceeds the char bound.
    TooLong { chars: usize, max: usize },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "task text cannot be blank"),
            Self::TooLong { chars, max } => {
                write!(f, "task text has {chars} chars; at most {max} allowed")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// One to-do item.
///
/// Serialized as a bare JSON string. Deserialization runs the same
/// trimming/blank check as [`Task::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Task(String);

impl Task {
    /// Trims `text` and rejects blank input.
    ///
    /// Used for every path that produces a task, including store reads, so
    /// legacy rows longer than the input bound still load.
    pub fn parse(text: impl AsRef<str>) -> Result<Self, TaskValidationError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TaskValidationError::Blank);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Like [`Task::parse`], additionally enforcing `MAX_TASK_CHARS`.
    pub fn new_bounded(text: impl AsRef<str>) -> Result<Self, TaskValidationError> {
        let task = Self::parse(text)?;
        let chars = task.0.chars().count();
        if chars > MAX_TASK_CHARS {
            return Err(TaskValidationError::TooLong {
                chars,
                max: MAX_TASK_CHARS,
            });
        }
        Ok(task)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Task {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Task {
    type Error = TaskValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Task> for String {
    fn from(value: Task) -> Self {
        value.0
    }
}

/// Identifies one of the two persisted task lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKey {
    /// Active tasks.
    Todo,
    /// Tasks marked done.
    Completed,
}

impl ListKey {
    /// Every list key, in a fixed order.
    pub const ALL: [ListKey; 2] = [ListKey::Todo, ListKey::Completed];

    /// Stable key used by persistent stores.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Todo => "todo_list",
            Self::Completed => "completed_list",
        }
    }

    /// Inverse of [`ListKey::storage_key`].
    pub fn from_storage_key(value: &str) -> Option<Self> {
        match value {
            "todo_list" => Some(Self::Todo),
            "completed_list" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl Display for ListKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_key())
    }
}

/// Snapshot of both task lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLists {
    /// Active tasks in insertion order.
    pub todo: Vec<Task>,
    /// Completed tasks in completion order.
    pub completed: Vec<Task>,
}

impl TaskLists {
    pub fn list(&self, key: ListKey) -> &[Task] {
        match key {
            ListKey::Todo => &self.todo,
            ListKey::Completed => &self.completed,
        }
    }

    pub fn list_mut(&mut self, key: ListKey) -> &mut Vec<Task> {
        match key {
            ListKey::Todo => &mut self.todo,
            ListKey::Completed => &mut self.completed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.todo.is_empty() && self.completed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ListKey, Task, TaskLists, TaskValidationError, MAX_TASK_CHARS};

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let task = Task::parse("  buy milk \n").unwrap();
        assert_eq!(task.as_str(), "buy milk");
    }

    #[test]
    fn parse_rejects_blank_text() {
        assert_eq!(Task::parse("").unwrap_err(), TaskValidationError::Blank);
        assert_eq!(Task::parse(" \t ").unwrap_err(), TaskValidationError::Blank);
    }

    #[test]
    fn new_bounded_counts_chars_not_bytes() {
        let at_limit = "é".repeat(MAX_TASK_CHARS);
        assert!(Task::new_bounded(&at_limit).is_ok());

        let over = "x".repeat(MAX_TASK_CHARS + 1);
        assert_eq!(
            Task::new_bounded(&over).unwrap_err(),
            TaskValidationError::TooLong {
                chars: MAX_TASK_CHARS + 1,
                max: MAX_TASK_CHARS
            }
        );
    }

    #[test]
    fn new_bounded_measures_after_trim() {
        let padded = format!("   {}   ", "a".repeat(MAX_TASK_CHARS));
        assert_eq!(Task::new_bounded(padded).unwrap().char_count(), MAX_TASK_CHARS);
    }

    #[test]
    fn storage_keys_round_trip() {
        for key in ListKey::ALL {
            assert_eq!(ListKey::from_storage_key(key.storage_key()), Some(key));
        }
        assert_eq!(ListKey::from_storage_key("settings"), None);
    }

    #[test]
    fn list_mut_targets_matching_sequence() {
        let mut lists = TaskLists::default();
        lists
            .list_mut(ListKey::Completed)
            .push(Task::parse("done").unwrap());
        assert!(lists.todo.is_empty());
        assert_eq!(lists.list(ListKey::Completed).len(), 1);
    }
}
