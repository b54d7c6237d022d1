//! Step execution engine.
//!
//! - `step`: read loop, worker pool, failure policy
//! - `chunk`: one chunk's attempts, retry decisions, single write
//! - `cancel`: stop signal

pub mod cancel;
pub(crate) mod chunk;
pub mod step;

pub use cancel::{StopHandle, StopSignal};
pub use step::{FailurePolicy, StepExecutor, StepSettings};
