//! Step executor: read chunks in source order and hand them to chunk units on
//! a bounded pool, behind a throttle.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::domain::{Chunk, ChunkState, Decider, StepExecution};
use crate::ports::{Clock, ItemProcessor, ItemReader, ItemSink, ItemSource};

use super::cancel::StopSignal;
use super::chunk::{Admission, ChunkReport, ChunkUnit};

/// What the step does after a chunk is abandoned for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop reading, and drop read chunks that have not started processing.
    #[default]
    #[serde(rename = "abort")]
    AbortOnFirstFailure,

    /// Keep processing the rest of the source.
    #[serde(rename = "continue")]
    ContinueOnFailure,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(FailurePolicy::AbortOnFirstFailure),
            "continue" => Ok(FailurePolicy::ContinueOnFailure),
            other => Err(format!("unknown failure policy: {other} (expected abort or continue)")),
        }
    }
}

/// Sizing and failure settings of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSettings {
    /// Items per chunk. The last chunk may be smaller.
    pub chunk_size: usize,

    /// Chunks allowed in `Processing` at once.
    pub throttle_limit: usize,

    /// Chunk units alive at once, waiting or processing.
    pub pool_size: usize,

    pub failure_policy: FailurePolicy,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            throttle_limit: 1,
            pool_size: 4,
            failure_policy: FailurePolicy::AbortOnFirstFailure,
        }
    }
}

/// Chunk-oriented step. Built by [`crate::app::StepBuilder`].
pub struct StepExecutor<I, O> {
    pub(crate) name: Arc<str>,
    pub(crate) source: Arc<dyn ItemSource<I>>,
    pub(crate) processor: Arc<dyn ItemProcessor<I, O>>,
    pub(crate) sink: Arc<dyn ItemSink<O>>,
    pub(crate) decider: Arc<dyn Decider>,
    pub(crate) settings: StepSettings,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Why the read loop ended.
enum ReadEnd {
    Exhausted,
    Stopped,
    Halted,
    SourceFailed(String),
}

impl<I, O> StepExecutor<I, O>
where
    I: Clone + Display + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &StepSettings {
        &self.settings
    }

    /// Run the step to completion and report its counters.
    ///
    /// Never returns an error: source failures and abandoned chunks show up
    /// as a `FAILED` step with the details attached.
    pub async fn execute(&self, mut stop: StopSignal) -> StepExecution {
        let mut execution = StepExecution::new(self.name.as_ref(), self.clock.now());
        info!(
            step = %self.name,
            chunk_size = self.settings.chunk_size,
            throttle_limit = self.settings.throttle_limit,
            pool_size = self.settings.pool_size,
            "step started"
        );

        let admission = Admission {
            throttle: Arc::new(Semaphore::new(self.settings.throttle_limit)),
            halt: Arc::new(AtomicBool::new(false)),
            abort_on_failure: self.settings.failure_policy == FailurePolicy::AbortOnFirstFailure,
            stop: stop.clone(),
        };
        let pool = Arc::new(Semaphore::new(self.settings.pool_size));
        let mut units: JoinSet<ChunkReport> = JoinSet::new();

        let end = match self.source.open().await {
            Ok(reader) => {
                self.read_loop(reader, &mut execution, &admission, &pool, &mut stop, &mut units)
                    .await
            }
            Err(e) => ReadEnd::SourceFailed(e.to_string()),
        };

        while let Some(joined) = units.join_next().await {
            absorb(&mut execution, joined);
        }

        let interrupted = match end {
            ReadEnd::SourceFailed(message) => {
                error!(step = %self.name, error = %message, "item source failed");
                execution.exit_message = Some(message);
                false
            }
            ReadEnd::Stopped => true,
            ReadEnd::Exhausted | ReadEnd::Halted => false,
        };
        let stopped = interrupted || (stop.is_stopped() && execution.abandoned_chunk_count > 0);
        execution.finish(stopped, self.clock.now());

        info!(
            step = %self.name,
            status = ?execution.status,
            read = execution.read_count,
            written = execution.write_count,
            filtered = execution.filter_count,
            commits = execution.commit_count,
            failed_chunks = execution.failed_chunk_count,
            abandoned_chunks = execution.abandoned_chunk_count,
            retries = execution.retry_count,
            "step finished"
        );
        execution
    }

    async fn read_loop(
        &self,
        mut reader: Box<dyn ItemReader<I>>,
        execution: &mut StepExecution,
        admission: &Admission,
        pool: &Arc<Semaphore>,
        stop: &mut StopSignal,
        units: &mut JoinSet<ChunkReport>,
    ) -> ReadEnd {
        let mut seq = 0u64;
        loop {
            while let Some(joined) = units.try_join_next() {
                absorb(execution, joined);
            }
            if let Some(end) = self.gate(admission) {
                return end;
            }

            // Reading stays at most `pool_size` chunks ahead of processing.
            let slot = tokio::select! {
                slot = pool.clone().acquire_owned() => slot,
                _ = stop.stopped() => return ReadEnd::Stopped,
            };
            let Ok(slot) = slot else {
                return ReadEnd::Halted;
            };
            if let Some(end) = self.gate(admission) {
                return end;
            }

            let mut items = Vec::with_capacity(self.settings.chunk_size);
            let mut end = None;
            while items.len() < self.settings.chunk_size {
                match reader.read().await {
                    Ok(Some(item)) => items.push(item),
                    Ok(None) => {
                        end = Some(ReadEnd::Exhausted);
                        break;
                    }
                    Err(e) => {
                        end = Some(ReadEnd::SourceFailed(e.to_string()));
                        break;
                    }
                }
            }

            execution.read_count += items.len() as u64;
            if !items.is_empty() {
                execution.chunk_count += 1;
                let unit = ChunkUnit {
                    step: self.name.clone(),
                    chunk: Chunk::new(seq, items),
                    processor: self.processor.clone(),
                    sink: self.sink.clone(),
                    decider: self.decider.clone(),
                };
                seq += 1;

                let admission = admission.clone();
                units.spawn(async move {
                    let report = unit.run(admission).await;
                    drop(slot);
                    report
                });
            }

            if let Some(end) = end {
                return end;
            }
        }
    }

    fn gate(&self, admission: &Admission) -> Option<ReadEnd> {
        if admission.stop.is_stopped() {
            warn!(step = %self.name, "stop requested; no further chunks admitted");
            return Some(ReadEnd::Stopped);
        }
        if admission.halt.load(Ordering::SeqCst) {
            warn!(step = %self.name, "chunk failed; aborting remaining chunks");
            return Some(ReadEnd::Halted);
        }
        None
    }
}

fn absorb(execution: &mut StepExecution, joined: Result<ChunkReport, JoinError>) {
    let report = match joined {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "chunk unit panicked");
            execution.failed_chunk_count += 1;
            execution
                .exit_message
                .get_or_insert_with(|| format!("chunk unit panicked: {e}"));
            return;
        }
    };

    execution.process_count += report.process_calls;
    execution.retry_count += u64::from(report.attempts.saturating_sub(1));

    match report.state {
        ChunkState::Succeeded => {
            execution.commit_count += 1;
            execution.write_count += report.written as u64;
            execution.filter_count += report.filtered as u64;
        }
        ChunkState::Failed => {
            execution.failed_chunk_count += 1;
            execution.lost_item_count += report.size as u64;
            if let Some(failure) = report.failure {
                execution.failures.push(failure);
            }
        }
        ChunkState::Pending | ChunkState::Processing => {
            execution.abandoned_chunk_count += 1;
            execution.lost_item_count += report.size as u64;
        }
    }
}
