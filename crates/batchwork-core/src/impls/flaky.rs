//! Scripted failure injection around a task processor.
//!
//! Failure state is owned by the wrapper and keyed per task name, so it is
//! safe to share between concurrently processed chunks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ProcessError, ProcessOutcome, Task};
use crate::ports::ItemProcessor;

/// How many calls for one task fail before the inner processor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failures {
    First(u32),
    Always,
}

impl Failures {
    fn fails(self, call: u32) -> bool {
        match self {
            Failures::First(n) => call <= n,
            Failures::Always => true,
        }
    }
}

/// Which calls fail, by task name, with a default for unlisted tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePlan {
    default: Failures,
    overrides: HashMap<String, Failures>,
}

impl FailurePlan {
    pub fn none() -> Self {
        Self::first_attempts(0)
    }

    /// The first `n` calls for every task fail.
    pub fn first_attempts(n: u32) -> Self {
        Self {
            default: Failures::First(n),
            overrides: HashMap::new(),
        }
    }

    pub fn always() -> Self {
        Self {
            default: Failures::Always,
            overrides: HashMap::new(),
        }
    }

    pub fn first_attempts_for(mut self, name: impl Into<String>, n: u32) -> Self {
        self.overrides.insert(name.into(), Failures::First(n));
        self
    }

    pub fn always_for(mut self, name: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), Failures::Always);
        self
    }

    fn rule(&self, name: &str) -> Failures {
        self.overrides.get(name).copied().unwrap_or(self.default)
    }
}

/// Wraps a processor and fails calls according to a [`FailurePlan`] with
/// retryable `transient` errors.
#[derive(Debug)]
pub struct FlakyProcessor<P> {
    inner: P,
    plan: FailurePlan,
    calls: Mutex<HashMap<String, u32>>,
    invocations: AtomicU64,
}

impl<P> FlakyProcessor<P> {
    pub fn new(inner: P, plan: FailurePlan) -> Self {
        Self {
            inner,
            plan,
            calls: Mutex::new(HashMap::new()),
            invocations: AtomicU64::new(0),
        }
    }

    /// Total calls, failed ones included.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    fn next_call(&self, name: &str) -> u32 {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        let call = calls.entry(name.to_string()).or_insert(0);
        *call += 1;
        *call
    }

    /// A success ends the task's failure script; the next launch starts over.
    fn reset(&self, name: &str) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.remove(name);
    }
}

#[async_trait]
impl<P> ItemProcessor<Task, Task> for FlakyProcessor<P>
where
    P: ItemProcessor<Task, Task>,
{
    async fn process(&self, task: Task) -> ProcessOutcome<Task> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let call = self.next_call(task.name());

        if self.plan.rule(task.name()).fails(call) {
            debug!(task = task.name(), call, "simulated failure");
            return ProcessOutcome::RetryableFailure(ProcessError::transient(format!(
                "simulated failure {call} for {}",
                task.name()
            )));
        }
        let name = task.name().to_string();
        let outcome = self.inner.process(task).await;
        if !outcome.is_failure() {
            self.reset(&name);
        }
        outcome
    }
}
