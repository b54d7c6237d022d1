//! ItemSink port - 出力の抽象化

use async_trait::async_trait;

use crate::error::SinkError;

/// Destination for processed items.
///
/// One `write` call carries one whole chunk; a sink either applies it or
/// returns an error, never half of it.
#[async_trait]
pub trait ItemSink<O>: Send + Sync {
    async fn write(&self, items: &[O]) -> Result<(), SinkError>;

    /// Drop everything written so far. Running it twice is the same as once.
    async fn reset(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
