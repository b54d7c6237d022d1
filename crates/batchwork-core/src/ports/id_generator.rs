//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::{JobExecutionId, JobInstanceId};
use crate::ports::Clock;

/// IdGenerator は job instance / execution の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の launch から同時に使える）
pub trait IdGenerator: Send + Sync {
    fn generate_instance_id(&self) -> JobInstanceId;

    fn generate_execution_id(&self) -> JobExecutionId;
}

/// ULID generator whose timestamp part comes from a [`Clock`], so ids are
/// deterministic in time under a `FixedClock`.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_instance_id(&self) -> JobInstanceId {
        JobInstanceId::from(self.next_ulid())
    }

    fn generate_execution_id(&self) -> JobExecutionId {
        JobExecutionId::from(self.next_ulid())
    }
}
