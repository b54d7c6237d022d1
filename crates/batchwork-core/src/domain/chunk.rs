//! Chunk: a bounded batch of items committed together.

use serde::{Deserialize, Serialize};

/// Chunk execution state.
///
/// State transitions:
/// - Pending -> Processing -> Succeeded
/// - Pending -> Processing -> Failed (retries exhausted or fatal error)
///
/// A chunk that never leaves `Pending` was abandoned before it was admitted
/// (stop request, or an earlier chunk failed under the abort policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkState {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl ChunkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkState::Succeeded | ChunkState::Failed)
    }
}

/// Items read in source order for one execution unit.
#[derive(Debug, Clone)]
pub struct Chunk<I> {
    seq: u64,
    items: Vec<I>,
    state: ChunkState,
}

impl<I> Chunk<I> {
    pub fn new(seq: u64, items: Vec<I>) -> Self {
        Self {
            seq,
            items,
            state: ChunkState::Pending,
        }
    }

    /// Position of this chunk in read order, starting at 0.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Pending -> Processing.
    pub fn begin(&mut self) {
        debug_assert_eq!(self.state, ChunkState::Pending);
        self.state = ChunkState::Processing;
    }

    /// Processing -> Succeeded.
    pub fn mark_succeeded(&mut self) {
        debug_assert_eq!(self.state, ChunkState::Processing);
        self.state = ChunkState::Succeeded;
    }

    /// Processing -> Failed.
    pub fn mark_failed(&mut self) {
        debug_assert_eq!(self.state, ChunkState::Processing);
        self.state = ChunkState::Failed;
    }
}
