//! JobStore port - ジョブメタデータの正本
//!
//! Records job instances, their executions and step outcomes. The step
//! executor never talks to it; only the launcher does.

use async_trait::async_trait;

use crate::domain::{JobExecution, JobExecutionId, JobParameters, StepExecution};
use crate::error::StoreError;

/// Job metadata store.
///
/// # 設計原則
/// - (job name, parameters) が job instance を決める
/// - 実行中 / 完了済みの instance への再 launch は拒否する
/// - FAILED / STOPPED の instance は最初からやり直せる（checkpoint なし）
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Resolve or create the instance for `(job_name, params)` and open a new
    /// execution for it in `STARTING`.
    async fn create_execution(
        &self,
        job_name: &str,
        params: &JobParameters,
    ) -> Result<JobExecution, StoreError>;

    /// Replace the stored execution with `execution`.
    async fn update_execution(&self, execution: &JobExecution) -> Result<(), StoreError>;

    /// Attach a step outcome to its execution without closing it.
    async fn record_step(
        &self,
        id: JobExecutionId,
        step: &StepExecution,
    ) -> Result<(), StoreError>;

    async fn get_execution(&self, id: JobExecutionId) -> Result<JobExecution, StoreError>;

    /// Executions of `job_name`, oldest first.
    async fn executions_of(&self, job_name: &str) -> Result<Vec<JobExecution>, StoreError>;
}
