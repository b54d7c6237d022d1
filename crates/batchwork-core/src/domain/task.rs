//! Task: the unit of work read from the input resource.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Lifecycle of a task.
///
/// Transitions only move forward: `New -> InProgress -> Done` (skipping
/// `InProgress` is allowed). The derived `Ord` follows declaration order and is
/// what [`Task::advance`] checks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    New,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named task with a status and a free-form result.
///
/// `name` is fixed at construction. `status` and `result` change only through
/// [`Task::advance`] and [`Task::complete`], which enforce monotonic status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    name: String,
    status: TaskStatus,
    #[serde(default)]
    result: String,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::New,
            result: String::new(),
        }
    }

    /// Rebuild a task exactly as it appears in an input record.
    pub fn from_parts(name: impl Into<String>, status: TaskStatus, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            result: result.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    /// Move to `next`. Staying in the same state is a no-op; going backwards
    /// is rejected.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if next < self.status {
            return Err(TaskError::StatusRegression {
                name: self.name.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Finish the task with a non-empty result.
    pub fn complete(&mut self, result: impl Into<String>) -> Result<(), TaskError> {
        let result = result.into();
        if result.is_empty() {
            return Err(TaskError::EmptyResult(self.name.clone()));
        }
        if self.status.is_terminal() {
            return Err(TaskError::StatusRegression {
                name: self.name.clone(),
                from: self.status,
                to: TaskStatus::Done,
            });
        }
        self.status = TaskStatus::Done;
        self.result = result;
        Ok(())
    }
}

/// Output line format of the file sink.
impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task(name={}, status={}, result={})",
            self.name, self.status, self.result
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn new_task_starts_empty() {
        let task = Task::new("t1");
        assert_eq!(task.status(), TaskStatus::New);
        assert!(task.result().is_empty());
    }

    #[test]
    fn complete_sets_done_and_result() {
        let mut task = Task::new("t1");
        task.advance(TaskStatus::InProgress).unwrap();
        task.complete("Processed").unwrap();

        assert_eq!(task.status(), TaskStatus::Done);
        assert_eq!(task.to_string(), "Task(name=t1, status=DONE, result=Processed)");
    }

    #[rstest]
    #[case::done_to_new(TaskStatus::Done, TaskStatus::New)]
    #[case::done_to_in_progress(TaskStatus::Done, TaskStatus::InProgress)]
    #[case::in_progress_to_new(TaskStatus::InProgress, TaskStatus::New)]
    fn status_never_regresses(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        let mut task = Task::from_parts("t1", from, "");
        let err = task.advance(to).unwrap_err();

        assert!(matches!(err, TaskError::StatusRegression { .. }));
        assert_eq!(task.status(), from);
    }

    #[test]
    fn completing_a_done_task_is_rejected() {
        let mut task = Task::from_parts("t1", TaskStatus::Done, "earlier");
        assert!(task.complete("again").is_err());
        assert_eq!(task.result(), "earlier");
    }

    #[test]
    fn empty_result_is_rejected() {
        let mut task = Task::new("t1");
        assert_eq!(task.complete(""), Err(TaskError::EmptyResult("t1".into())));
        assert_eq!(task.status(), TaskStatus::New);
    }

    #[test]
    fn status_tokens_match_input_format() {
        let s = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(s, "\"IN_PROGRESS\"");
    }
}
