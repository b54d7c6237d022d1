//! Chunk execution unit: process every item, write once, retry the whole chunk
//! on failure.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::domain::{
    Chunk, ChunkFailure, ChunkState, Decider, Decision, ErrorKind, ProcessError, ProcessOutcome,
};
use crate::ports::{ItemProcessor, ItemSink};
use crate::retry::RetryContext;

use super::cancel::StopSignal;

/// What one chunk unit reports back to the step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChunkReport {
    pub seq: u64,
    pub size: usize,

    /// `Pending` when the chunk was never admitted.
    pub state: ChunkState,

    pub written: usize,
    pub filtered: usize,
    pub attempts: u32,
    pub process_calls: u64,
    pub failure: Option<ChunkFailure>,
}

/// Gates shared by every unit of one step run.
#[derive(Clone)]
pub(crate) struct Admission {
    pub throttle: Arc<Semaphore>,

    /// Set when a chunk failed under the abort policy.
    pub halt: Arc<AtomicBool>,

    /// Whether a failed chunk sets `halt`.
    pub abort_on_failure: bool,

    pub stop: StopSignal,
}

impl Admission {
    fn closed(&self) -> bool {
        self.halt.load(Ordering::SeqCst) || self.stop.is_stopped()
    }
}

pub(crate) struct ChunkUnit<I, O> {
    pub step: Arc<str>,
    pub chunk: Chunk<I>,
    pub processor: Arc<dyn ItemProcessor<I, O>>,
    pub sink: Arc<dyn ItemSink<O>>,
    pub decider: Arc<dyn Decider>,
}

/// A failed attempt: the error and whether it was fatal.
type AttemptFailure = (ProcessError, bool);

impl<I, O> ChunkUnit<I, O>
where
    I: Clone + Display + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Wait for a throttle slot, then run the chunk to success or failure.
    ///
    /// The slot is held across backoff sleeps, so a retrying chunk keeps
    /// later chunks out of `Processing` until it resolves.
    pub async fn run(mut self, admission: Admission) -> ChunkReport {
        let seq = self.chunk.seq();
        let size = self.chunk.len();
        let mut report = ChunkReport {
            seq,
            size,
            state: ChunkState::Pending,
            written: 0,
            filtered: 0,
            attempts: 0,
            process_calls: 0,
            failure: None,
        };

        let Ok(_permit) = admission.throttle.clone().acquire_owned().await else {
            return report;
        };
        if admission.closed() {
            debug!(step = %self.step, chunk = seq, "chunk not admitted");
            return report;
        }

        self.chunk.begin();
        debug!(step = %self.step, chunk = seq, items = size, "chunk started");

        let mut ctx = RetryContext::new();
        loop {
            let attempt = ctx.begin_attempt();
            report.attempts = attempt;

            let (error, fatal) = match self.attempt(&mut report).await {
                Ok(()) => {
                    self.chunk.mark_succeeded();
                    report.state = self.chunk.state();
                    info!(
                        step = %self.step,
                        chunk = seq,
                        attempt,
                        written = report.written,
                        filtered = report.filtered,
                        "chunk committed"
                    );
                    return report;
                }
                Err(failure) => failure,
            };

            ctx.record_failure(error.clone(), fatal);
            match self.decider.decide(&ctx) {
                Decision::Retry { delay, reason } => {
                    warn!(
                        step = %self.step,
                        chunk = seq,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        %reason,
                        "chunk attempt failed"
                    );
                    ctx.next_delay = Some(delay);
                    tokio::time::sleep(delay).await;
                }
                Decision::GiveUp { reason } => {
                    self.chunk.mark_failed();
                    let items: Vec<String> =
                        self.chunk.items().iter().map(ToString::to_string).collect();
                    error!(
                        step = %self.step,
                        chunk = seq,
                        attempts = attempt,
                        items = ?items,
                        error = %error,
                        %reason,
                        "chunk failed"
                    );
                    if admission.abort_on_failure {
                        admission.halt.store(true, Ordering::SeqCst);
                    }
                    report.state = self.chunk.state();
                    report.failure = Some(ChunkFailure {
                        chunk: seq,
                        items,
                        error,
                        attempts: attempt,
                        fatal,
                    });
                    return report;
                }
            }
        }
    }

    /// One pass over the chunk, starting from the original items.
    ///
    /// Every item goes through the processor on every attempt. The first
    /// failure is reported unless a later item failed fatally. Outputs are
    /// written in a single sink call only when no item failed.
    async fn attempt(&self, report: &mut ChunkReport) -> Result<(), AttemptFailure> {
        let mut outputs = Vec::with_capacity(self.chunk.len());
        let mut filtered = 0;
        let mut failure: Option<AttemptFailure> = None;

        for item in self.chunk.items().iter().cloned() {
            report.process_calls += 1;
            let (error, fatal) = match self.processor.process(item).await {
                ProcessOutcome::Success(out) => {
                    outputs.push(out);
                    continue;
                }
                ProcessOutcome::Filtered => {
                    filtered += 1;
                    continue;
                }
                ProcessOutcome::RetryableFailure(e) => (e, false),
                ProcessOutcome::FatalFailure(e) => (e, true),
            };
            match &failure {
                None => failure = Some((error, fatal)),
                Some((_, false)) if fatal => failure = Some((error, fatal)),
                Some(_) => {}
            }
        }
        if let Some(failure) = failure {
            return Err(failure);
        }

        if !outputs.is_empty() {
            self.sink
                .write(&outputs)
                .await
                .map_err(|e| (ProcessError::new(ErrorKind::Sink, e.to_string()), false))?;
        }

        report.written = outputs.len();
        report.filtered = filtered;
        Ok(())
    }
}
