//! Result of processing one item.

use super::errors::ProcessError;

/// What a processor reports for a single item.
///
/// Failures are values rather than errors so the step executor can tell a
/// retryable failure from a fatal one without inspecting error types.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome<O> {
    /// The transformed item, to be written with the rest of its chunk.
    Success(O),

    /// The item is dropped from the write. Not a failure.
    Filtered,

    /// The attempt failed; the retry policy decides whether to try again.
    RetryableFailure(ProcessError),

    /// The attempt failed and must not be retried.
    FatalFailure(ProcessError),
}

impl<O> ProcessOutcome<O> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::RetryableFailure(_) | ProcessOutcome::FatalFailure(_)
        )
    }

    pub fn map<U>(self, f: impl FnOnce(O) -> U) -> ProcessOutcome<U> {
        match self {
            ProcessOutcome::Success(o) => ProcessOutcome::Success(f(o)),
            ProcessOutcome::Filtered => ProcessOutcome::Filtered,
            ProcessOutcome::RetryableFailure(e) => ProcessOutcome::RetryableFailure(e),
            ProcessOutcome::FatalFailure(e) => ProcessOutcome::FatalFailure(e),
        }
    }
}

/// `Err` becomes a retryable failure, matching the default of retrying every
/// error kind.
impl<O> From<Result<O, ProcessError>> for ProcessOutcome<O> {
    fn from(result: Result<O, ProcessError>) -> Self {
        match result {
            Ok(o) => ProcessOutcome::Success(o),
            Err(e) => ProcessOutcome::RetryableFailure(e),
        }
    }
}
