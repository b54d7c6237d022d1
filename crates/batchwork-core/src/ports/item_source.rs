//! ItemSource port - 入力の抽象化
//!
//! A source hands out fresh readers; every [`ItemSource::open`] starts from the
//! first record again.

use async_trait::async_trait;

use crate::error::SourceError;

/// Factory for readers over a bounded, ordered item sequence.
#[async_trait]
pub trait ItemSource<I>: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ItemReader<I>>, SourceError>;
}

/// Sequential cursor over a source. `Ok(None)` marks the end.
#[async_trait]
pub trait ItemReader<I>: Send {
    async fn read(&mut self) -> Result<Option<I>, SourceError>;
}
