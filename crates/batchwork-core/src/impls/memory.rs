//! In-memory item source and sink, for tests and embedding.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{SinkError, SourceError};
use crate::ports::{ItemReader, ItemSink, ItemSource};

/// Source over a fixed list. Each `open` replays it from the start.
#[derive(Debug, Clone)]
pub struct InMemorySource<I> {
    items: Vec<I>,
}

impl<I> InMemorySource<I> {
    pub fn new(items: Vec<I>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl<I> ItemSource<I> for InMemorySource<I>
where
    I: Clone + Send + Sync + 'static,
{
    async fn open(&self) -> Result<Box<dyn ItemReader<I>>, SourceError> {
        Ok(Box::new(InMemoryReader {
            items: self.items.clone().into_iter(),
        }))
    }
}

struct InMemoryReader<I> {
    items: std::vec::IntoIter<I>,
}

#[async_trait]
impl<I: Send + 'static> ItemReader<I> for InMemoryReader<I> {
    async fn read(&mut self) -> Result<Option<I>, SourceError> {
        Ok(self.items.next())
    }
}

#[derive(Debug)]
struct SinkState<O> {
    items: Vec<O>,
    writes: Vec<usize>,
    fail_next: usize,
}

/// Sink that keeps every committed item in memory.
///
/// `failing_first(n)` rejects the first `n` writes, for exercising retries
/// caused by the sink.
#[derive(Debug)]
pub struct InMemorySink<O> {
    state: Mutex<SinkState<O>>,
}

impl<O> InMemorySink<O> {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(writes: usize) -> Self {
        Self {
            state: Mutex::new(SinkState {
                items: Vec::new(),
                writes: Vec::new(),
                fail_next: writes,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState<O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Size of every accepted write, in commit order.
    pub fn writes(&self) -> Vec<usize> {
        self.state().writes.clone()
    }
}

impl<O: Clone> InMemorySink<O> {
    pub fn items(&self) -> Vec<O> {
        self.state().items.clone()
    }
}

impl<O: std::fmt::Display> InMemorySink<O> {
    /// Committed items in their output line form.
    pub fn lines(&self) -> Vec<String> {
        self.state().items.iter().map(ToString::to_string).collect()
    }
}

impl<O> Default for InMemorySink<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<O> ItemSink<O> for InMemorySink<O>
where
    O: Clone + Send + Sync + 'static,
{
    async fn write(&self, items: &[O]) -> Result<(), SinkError> {
        let mut state = self.state();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(SinkError::Rejected("scripted sink failure".to_string()));
        }
        state.items.extend_from_slice(items);
        state.writes.push(items.len());
        Ok(())
    }

    async fn reset(&self) -> Result<(), SinkError> {
        let mut state = self.state();
        state.items.clear();
        state.writes.clear();
        Ok(())
    }
}
