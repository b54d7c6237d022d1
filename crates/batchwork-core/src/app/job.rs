//! Job: a name and exactly one step.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::StepExecution;
use crate::engine::{StepExecutor, StopSignal};

/// A runnable step, independent of its item types.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, stop: StopSignal) -> StepExecution;
}

#[async_trait]
impl<I, O> Step for StepExecutor<I, O>
where
    I: Clone + Display + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        StepExecutor::name(self)
    }

    async fn execute(&self, stop: StopSignal) -> StepExecution {
        StepExecutor::execute(self, stop).await
    }
}

#[derive(Clone)]
pub struct Job {
    name: String,
    step: Arc<dyn Step>,
}

impl Job {
    pub fn new<S: Step + 'static>(name: impl Into<String>, step: S) -> Self {
        Self {
            name: name.into(),
            step: Arc::new(step),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self) -> &dyn Step {
        self.step.as_ref()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("step", &self.step.name())
            .finish()
    }
}
