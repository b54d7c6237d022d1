use thiserror::Error;

use crate::domain::{JobExecutionId, TaskStatus};

/// Failure while opening or reading an item source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("{0}")]
    Other(String),
}

/// Failure while persisting a chunk. A sink either applies a whole write or
/// returns one of these.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected write: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job execution {0} not found")]
    NotFound(JobExecutionId),

    #[error("job {job} already has a running execution for these parameters")]
    AlreadyRunning { job: String },

    #[error("job {job} already completed for these parameters")]
    AlreadyComplete { job: String },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("launch rejected: {0}")]
    Rejected(#[from] StoreError),

    #[error("launcher is shutting down")]
    ShuttingDown,

    #[error("job execution {0} is not running")]
    NotRunning(JobExecutionId),
}

/// Wiring errors reported by [`crate::app::StepBuilder::build`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("throttle limit must be at least 1")]
    InvalidThrottleLimit,

    #[error("pool size must be at least 1")]
    InvalidPoolSize,

    #[error("retry limit must be at least 1")]
    InvalidRetryLimit,

    #[error("step {step} is missing its {component}")]
    MissingComponent {
        step: String,
        component: &'static str,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task {name}: status cannot move from {from} to {to}")]
    StatusRegression {
        name: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task {0}: result must not be empty")]
    EmptyResult(String),
}
