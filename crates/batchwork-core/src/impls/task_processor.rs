//! Processor that completes tasks.

use async_trait::async_trait;

use crate::domain::{ProcessError, ProcessOutcome, Task, TaskStatus};
use crate::ports::ItemProcessor;

/// Moves a task `NEW -> IN_PROGRESS -> DONE` with a fixed result.
///
/// A task that is already `DONE` cannot be completed again; that is reported
/// as a fatal `Invalid` failure.
#[derive(Debug, Clone)]
pub struct CompleteTask {
    result: String,
}

impl CompleteTask {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

impl Default for CompleteTask {
    fn default() -> Self {
        Self::new("Processed")
    }
}

#[async_trait]
impl ItemProcessor<Task, Task> for CompleteTask {
    async fn process(&self, mut task: Task) -> ProcessOutcome<Task> {
        let completed = task
            .advance(TaskStatus::InProgress)
            .and_then(|()| task.complete(self.result.clone()));
        match completed {
            Ok(()) => ProcessOutcome::Success(task),
            Err(e) => ProcessOutcome::FatalFailure(ProcessError::invalid(e.to_string())),
        }
    }
}
