//! Builds the job launcher from the loaded configuration.

use std::sync::Arc;

use batchwork_core::app::{Job, JobLauncher, StepBuilder};
use batchwork_core::domain::Task;
use batchwork_core::error::{BuildError, SinkError};
use batchwork_core::impls::{
    CompleteTask, CsvItemSource, FailurePlan, FileItemSink, FlakyProcessor, InMemoryJobStore,
};
use batchwork_core::ports::Clock;
use thiserror::Error;
use tracing::info;

use crate::config::{AppConfig, ConfigError};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("invalid step: {0}")]
    Build(#[from] BuildError),

    #[error("cannot prepare output: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn build_launcher(
    cfg: &AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<JobLauncher, WiringError> {
    let mut source = CsvItemSource::new(&cfg.input.path)
        .delimiter(cfg.input.delimiter as u8)
        .has_headers(cfg.input.has_headers);
    if cfg.input.max_item_count > 0 {
        source = source.max_item_count(cfg.input.max_item_count);
    }

    let sink = if cfg.output.reset_on_startup {
        FileItemSink::create(&cfg.output.path).await?
    } else {
        FileItemSink::append_to(&cfg.output.path)
    };

    let processor = CompleteTask::new(cfg.processor.result.clone());
    let builder = StepBuilder::<Task, Task>::new(cfg.step.name.clone())
        .source(source)
        .sink(sink)
        .retry_policy(cfg.retry.policy()?)
        .chunk_size(cfg.step.chunk_size)
        .throttle_limit(cfg.step.throttle_limit)
        .pool_size(cfg.step.pool_size)
        .failure_policy(cfg.step.failure_policy)
        .clock(clock.clone());
    let builder = match cfg.processor.simulated_failures {
        0 => builder.processor(processor),
        n => builder.processor(FlakyProcessor::new(
            processor,
            FailurePlan::first_attempts(n),
        )),
    };
    let step = builder.build()?;

    info!(
        job = %cfg.job.name,
        step = %cfg.step.name,
        input = %cfg.input.path.display(),
        output = %cfg.output.path.display(),
        chunk_size = cfg.step.chunk_size,
        throttle_limit = cfg.step.throttle_limit,
        retry_limit = cfg.retry.limit,
        "job wired"
    );

    let store = Arc::new(InMemoryJobStore::with_clock(clock.clone()));
    Ok(JobLauncher::new(Job::new(cfg.job.name.clone(), step), store, clock))
}
