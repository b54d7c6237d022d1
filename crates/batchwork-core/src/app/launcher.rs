//! JobLauncher - job の起動・停止・シャットダウン
//!
//! - launch: execution を作って spawn し、すぐに id を返す
//! - run: launch して完了まで待つ
//! - stop: 新しい chunk の受付を止める（処理中の chunk は最後まで走る）
//! - shutdown: 全 execution を stop して待つ

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::{JobExecution, JobExecutionId, JobParameters};
use crate::engine::StopHandle;
use crate::error::{LaunchError, StoreError};
use crate::ports::{Clock, JobStore};

use super::job::Job;

struct Running {
    stop: StopHandle,

    /// Taken by whoever waits for the execution.
    handle: Option<JoinHandle<()>>,
}

/// Executions in flight. The store is written under this lock whenever an
/// execution is in here, so a stop request cannot overwrite a final status.
type RunningMap = Arc<Mutex<HashMap<JobExecutionId, Running>>>;

pub struct JobLauncher {
    job: Arc<Job>,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    running: RunningMap,
    shutting_down: AtomicBool,
}

impl JobLauncher {
    pub fn new(job: Job, store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            job: Arc::new(job),
            store,
            clock,
            running: Arc::new(Mutex::new(HashMap::new())),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn job_name(&self) -> &str {
        self.job.name()
    }

    /// Start a new execution in the background.
    ///
    /// Fails when the launcher is shutting down or the store rejects the
    /// parameters (an execution of the same instance is running or complete).
    pub async fn launch(&self, params: JobParameters) -> Result<JobExecutionId, LaunchError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            warn!(job = self.job.name(), "launch rejected: shutting down");
            return Err(LaunchError::ShuttingDown);
        }

        let mut execution = match self.store.create_execution(self.job.name(), &params).await {
            Ok(execution) => execution,
            Err(e) => {
                warn!(job = self.job.name(), %params, error = %e, "launch rejected");
                return Err(e.into());
            }
        };
        let id = execution.id;

        let mut running = self.running.lock().await;
        execution.mark_started(self.clock.now());
        if let Err(e) = self.store.update_execution(&execution).await {
            error!(job = self.job.name(), execution = %id, error = %e, "could not start execution");
            execution.mark_failed(self.clock.now());
            if let Err(cleanup) = self.store.update_execution(&execution).await {
                error!(execution = %id, error = %cleanup, "could not mark execution failed");
            }
            return Err(e.into());
        }

        let stop = StopHandle::new();
        let signal = stop.signal();
        let job = self.job.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        let registry = self.running.clone();

        let handle = tokio::spawn(async move {
            info!(job = job.name(), execution = %id, "job started");
            let step = job.step().execute(signal).await;

            let mut running = registry.lock().await;
            if let Err(e) = store.record_step(id, &step).await {
                error!(execution = %id, error = %e, "failed to record step result");
            }
            execution.finish(step, clock.now());
            if let Err(e) = store.update_execution(&execution).await {
                error!(execution = %id, error = %e, "failed to record job result");
            }
            running.remove(&id);
            info!(
                job = job.name(),
                execution = %id,
                status = ?execution.status,
                "job finished"
            );
        });
        running.insert(
            id,
            Running {
                stop,
                handle: Some(handle),
            },
        );

        info!(job = self.job.name(), execution = %id, %params, "job launched");
        Ok(id)
    }

    /// Launch and wait for the execution to end.
    pub async fn run(&self, params: JobParameters) -> Result<JobExecution, LaunchError> {
        let id = self.launch(params).await?;

        let handle = self
            .running
            .lock()
            .await
            .get_mut(&id)
            .and_then(|running| running.handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(execution = %id, error = %e, "job task panicked");
            }
        }

        Ok(self.store.get_execution(id).await?)
    }

    /// Ask a running execution to stop admitting chunks.
    pub async fn stop(&self, id: JobExecutionId) -> Result<(), LaunchError> {
        let running = self.running.lock().await;
        let Some(entry) = running.get(&id) else {
            return Err(LaunchError::NotRunning(id));
        };
        entry.stop.stop();

        let mut execution = self.store.get_execution(id).await?;
        execution.mark_stopping();
        self.store.update_execution(&execution).await?;

        info!(job = self.job.name(), execution = %id, "stop requested");
        Ok(())
    }

    /// Refuse new launches, stop every running execution and wait for them.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);

        let mut handles = Vec::new();
        {
            let mut running = self.running.lock().await;
            for (id, entry) in running.iter_mut() {
                entry.stop.stop();
                if let Err(e) = self.mark_stopping(*id).await {
                    warn!(execution = %id, error = %e, "could not mark execution stopping");
                }
                handles.extend(entry.handle.take());
            }
        }

        info!(job = self.job.name(), draining = handles.len(), "launcher shutting down");
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "job task panicked");
            }
        }
    }

    pub async fn execution(&self, id: JobExecutionId) -> Result<JobExecution, StoreError> {
        self.store.get_execution(id).await
    }

    pub async fn executions(&self) -> Result<Vec<JobExecution>, StoreError> {
        self.store.executions_of(self.job.name()).await
    }

    async fn mark_stopping(&self, id: JobExecutionId) -> Result<(), StoreError> {
        let mut execution = self.store.get_execution(id).await?;
        execution.mark_stopping();
        self.store.update_execution(&execution).await
    }
}
