//! Domain model (tasks, chunks, outcomes, decisions, executions, ids).

pub mod chunk;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod params;
pub mod task;

pub use chunk::{Chunk, ChunkState};
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ErrorKind, ProcessError};
pub use ids::{JobExecutionId, JobInstanceId};
pub use job::{BatchStatus, ChunkFailure, JobExecution, StepExecution};
pub use outcome::ProcessOutcome;
pub use params::{JobParameter, JobParameters};
pub use task::{Task, TaskStatus};
