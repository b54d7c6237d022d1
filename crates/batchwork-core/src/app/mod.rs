//! Application layer: step wiring, jobs and the launcher.

pub mod builder;
pub mod job;
pub mod launcher;

pub use builder::StepBuilder;
pub use job::{Job, Step};
pub use launcher::JobLauncher;
