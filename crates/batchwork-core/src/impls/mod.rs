//! Implementations of the ports (file backends, in-memory doubles, processors).

pub mod csv_source;
pub mod file_sink;
pub mod flaky;
pub mod memory;
pub mod memory_store;
pub mod task_processor;

pub use csv_source::CsvItemSource;
pub use file_sink::FileItemSink;
pub use flaky::{FailurePlan, FlakyProcessor};
pub use memory::{InMemorySink, InMemorySource};
pub use memory_store::InMemoryJobStore;
pub use task_processor::CompleteTask;
