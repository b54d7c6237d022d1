//! ItemProcessor port - 変換の抽象化

use async_trait::async_trait;

use crate::domain::ProcessOutcome;

/// Transforms one item.
///
/// The step executor may call `process` several times for the same item
/// (once per chunk attempt), so implementations must not leave side effects
/// that are unsafe to repeat.
#[async_trait]
pub trait ItemProcessor<I, O>: Send + Sync {
    async fn process(&self, item: I) -> ProcessOutcome<O>;
}
