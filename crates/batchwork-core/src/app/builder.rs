//! StepBuilder - step の構築とワイヤリング
//!
//! Every collaborator is passed in explicitly; `build()` validates the
//! settings up front (fail-fast) instead of failing on the first chunk.

use std::fmt::Display;
use std::sync::Arc;

use crate::domain::{Decider, DefaultDecider};
use crate::engine::{FailurePolicy, StepExecutor, StepSettings};
use crate::error::BuildError;
use crate::ports::{Clock, ItemProcessor, ItemSink, ItemSource, SystemClock};
use crate::retry::RetryPolicy;

/// Builds a [`StepExecutor`].
///
/// # 使用例
/// ```ignore
/// let step = StepBuilder::new("retryStep")
///     .source(CsvItemSource::new("resources/tasks.csv"))
///     .processor(CompleteTask::new("Processed"))
///     .sink(FileItemSink::create("output.txt").await?)
///     .retry_policy(RetryPolicy::default())
///     .throttle_limit(1)
///     .build()?;
/// ```
pub struct StepBuilder<I, O> {
    name: String,
    source: Option<Arc<dyn ItemSource<I>>>,
    processor: Option<Arc<dyn ItemProcessor<I, O>>>,
    sink: Option<Arc<dyn ItemSink<O>>>,
    decider: Option<Arc<dyn Decider>>,
    retry_policy: RetryPolicy,
    settings: StepSettings,
    clock: Arc<dyn Clock>,
}

impl<I, O> StepBuilder<I, O>
where
    I: Clone + Display + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            processor: None,
            sink: None,
            decider: None,
            retry_policy: RetryPolicy::default(),
            settings: StepSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn source<S: ItemSource<I> + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn processor<P: ItemProcessor<I, O> + 'static>(self, processor: P) -> Self {
        self.processor_arc(Arc::new(processor))
    }

    /// Like [`Self::processor`], keeping a handle for the caller.
    pub fn processor_arc<P: ItemProcessor<I, O> + 'static>(mut self, processor: Arc<P>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn sink<S: ItemSink<O> + 'static>(self, sink: S) -> Self {
        self.sink_arc(Arc::new(sink))
    }

    /// Like [`Self::sink`], keeping a handle for the caller.
    pub fn sink_arc<S: ItemSink<O> + 'static>(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the policy-backed decider. The retry policy is then unused.
    pub fn decider<D: Decider + 'static>(mut self, decider: D) -> Self {
        self.decider = Some(Arc::new(decider));
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.settings.chunk_size = chunk_size;
        self
    }

    pub fn throttle_limit(mut self, throttle_limit: usize) -> Self {
        self.settings.throttle_limit = throttle_limit;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.settings.pool_size = pool_size;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.settings.failure_policy = policy;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// # 検証
    /// - chunk size / throttle limit / pool size / retry limit は 1 以上
    /// - source / processor / sink は必須
    pub fn build(self) -> Result<StepExecutor<I, O>, BuildError> {
        if self.settings.chunk_size == 0 {
            return Err(BuildError::InvalidChunkSize);
        }
        if self.settings.throttle_limit == 0 {
            return Err(BuildError::InvalidThrottleLimit);
        }
        if self.settings.pool_size == 0 {
            return Err(BuildError::InvalidPoolSize);
        }
        if self.decider.is_none() && self.retry_policy.limit == 0 {
            return Err(BuildError::InvalidRetryLimit);
        }

        let missing = |component: &'static str| BuildError::MissingComponent {
            step: self.name.clone(),
            component,
        };
        let source = self.source.clone().ok_or_else(|| missing("item source"))?;
        let processor = self.processor.clone().ok_or_else(|| missing("item processor"))?;
        let sink = self.sink.clone().ok_or_else(|| missing("item sink"))?;

        let decider = match self.decider {
            Some(decider) => decider,
            None => Arc::new(DefaultDecider::new(self.retry_policy)),
        };

        Ok(StepExecutor {
            name: Arc::from(self.name),
            source,
            processor,
            sink,
            decider,
            settings: self.settings,
            clock: self.clock,
        })
    }
}
