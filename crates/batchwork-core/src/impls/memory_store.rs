//! InMemoryJobStore - 開発用の job metadata store
//!
//! # 実装詳細
//! - (job name, parameters) -> instance id の HashMap
//! - execution は launch 順の Vec で保持
//! - tokio RwLock で排他制御

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    BatchStatus, JobExecution, JobExecutionId, JobInstanceId, JobParameters, StepExecution,
};
use crate::error::StoreError;
use crate::ports::{Clock, IdGenerator, JobStore, SystemClock, UlidGenerator};

#[derive(Debug, Default)]
struct StoreState {
    instances: HashMap<(String, JobParameters), JobInstanceId>,
    executions: Vec<JobExecution>,
}

impl StoreState {
    fn execution_mut(&mut self, id: JobExecutionId) -> Result<&mut JobExecution, StoreError> {
        self.executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

pub struct InMemoryJobStore {
    state: RwLock<StoreState>,
    ids: UlidGenerator<Arc<dyn Clock>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            ids: UlidGenerator::new(clock.clone()),
            clock,
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_execution(
        &self,
        job_name: &str,
        params: &JobParameters,
    ) -> Result<JobExecution, StoreError> {
        let mut state = self.state.write().await;
        let key = (job_name.to_string(), params.clone());

        let instance_id = match state.instances.get(&key) {
            Some(&instance_id) => {
                let previous = state.executions.iter().filter(|e| e.instance_id == instance_id);
                for execution in previous {
                    if execution.status.is_running() {
                        return Err(StoreError::AlreadyRunning {
                            job: job_name.to_string(),
                        });
                    }
                    if execution.status == BatchStatus::Completed {
                        return Err(StoreError::AlreadyComplete {
                            job: job_name.to_string(),
                        });
                    }
                }
                instance_id
            }
            None => {
                let instance_id = self.ids.generate_instance_id();
                state.instances.insert(key, instance_id);
                instance_id
            }
        };

        let execution = JobExecution::new(
            self.ids.generate_execution_id(),
            instance_id,
            job_name,
            params.clone(),
            self.clock.now(),
        );
        state.executions.push(execution.clone());
        Ok(execution)
    }

    async fn update_execution(&self, execution: &JobExecution) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        *state.execution_mut(execution.id)? = execution.clone();
        Ok(())
    }

    async fn record_step(
        &self,
        id: JobExecutionId,
        step: &StepExecution,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.execution_mut(id)?.step = Some(step.clone());
        Ok(())
    }

    async fn get_execution(&self, id: JobExecutionId) -> Result<JobExecution, StoreError> {
        let state = self.state.read().await;
        state
            .executions
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn executions_of(&self, job_name: &str) -> Result<Vec<JobExecution>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .executions
            .iter()
            .filter(|e| e.job_name == job_name)
            .cloned()
            .collect())
    }
}
