//! Job and step execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ProcessError;
use super::ids::{JobExecutionId, JobInstanceId};
use super::params::JobParameters;

/// Status shared by job and step executions.
///
/// - Starting -> Started -> Completed | Failed
/// - Started -> Stopping -> Stopped (stop request; in-flight chunks drain)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Starting,
    Started,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            BatchStatus::Starting | BatchStatus::Started | BatchStatus::Stopping
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Stopped
        )
    }
}

/// Diagnostic record of a chunk that was abandoned after its last attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk: u64,

    /// Display form of every item in the chunk.
    pub items: Vec<String>,

    pub error: ProcessError,
    pub attempts: u32,

    /// True when the error was fatal rather than retries running out.
    pub fatal: bool,
}

/// Counters and outcome of one step run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_name: String,
    pub status: BatchStatus,

    pub read_count: u64,
    pub write_count: u64,
    pub filter_count: u64,

    /// Chunks read from the source.
    pub chunk_count: u64,
    pub commit_count: u64,
    pub failed_chunk_count: u64,

    /// Chunks read but never admitted to processing.
    pub abandoned_chunk_count: u64,

    /// Items in failed or abandoned chunks.
    pub lost_item_count: u64,

    /// Chunk attempts beyond the first.
    pub retry_count: u64,

    /// Every call into the item processor, across all attempts.
    pub process_count: u64,

    pub failures: Vec<ChunkFailure>,

    /// Set when the step failed for a reason other than a chunk (source error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_message: Option<String>,

    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StepExecution {
    pub fn new(step_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            step_name: step_name.into(),
            status: BatchStatus::Started,
            read_count: 0,
            write_count: 0,
            filter_count: 0,
            chunk_count: 0,
            commit_count: 0,
            failed_chunk_count: 0,
            abandoned_chunk_count: 0,
            lost_item_count: 0,
            retry_count: 0,
            process_count: 0,
            failures: Vec::new(),
            exit_message: None,
            started_at,
            ended_at: None,
        }
    }

    /// Settle the final status from the counters.
    ///
    /// Any failed chunk or source error fails the step, even when a stop
    /// request arrived as well.
    pub fn finish(&mut self, stopped: bool, ended_at: DateTime<Utc>) {
        self.status = if self.failed_chunk_count > 0 || self.exit_message.is_some() {
            BatchStatus::Failed
        } else if stopped {
            BatchStatus::Stopped
        } else {
            BatchStatus::Completed
        };
        self.ended_at = Some(ended_at);
    }
}

/// One run of a job instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: JobExecutionId,
    pub instance_id: JobInstanceId,
    pub job_name: String,
    pub parameters: JobParameters,
    pub status: BatchStatus,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepExecution>,
}

impl JobExecution {
    pub fn new(
        id: JobExecutionId,
        instance_id: JobInstanceId,
        job_name: impl Into<String>,
        parameters: JobParameters,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instance_id,
            job_name: job_name.into(),
            parameters,
            status: BatchStatus::Starting,
            created_at,
            started_at: None,
            ended_at: None,
            step: None,
        }
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        self.status = BatchStatus::Started;
        self.started_at = Some(at);
    }

    pub fn mark_stopping(&mut self) {
        if self.status.is_running() {
            self.status = BatchStatus::Stopping;
        }
    }

    /// Close an execution that never got to run its step.
    pub fn mark_failed(&mut self, at: DateTime<Utc>) {
        self.status = BatchStatus::Failed;
        self.ended_at = Some(at);
    }

    /// Close the execution with the outcome of its step.
    pub fn finish(&mut self, step: StepExecution, at: DateTime<Utc>) {
        self.status = step.status;
        self.step = Some(step);
        self.ended_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap()
    }

    fn failure() -> ChunkFailure {
        ChunkFailure {
            chunk: 0,
            items: vec!["t1".into()],
            error: ProcessError::transient("boom"),
            attempts: 3,
            fatal: false,
        }
    }

    #[rstest]
    #[case::clean_run(false, false, None, BatchStatus::Completed)]
    #[case::stopped(true, false, None, BatchStatus::Stopped)]
    #[case::chunk_failed(false, true, None, BatchStatus::Failed)]
    #[case::failed_wins_over_stop(true, true, None, BatchStatus::Failed)]
    #[case::source_error(false, false, Some("unreadable"), BatchStatus::Failed)]
    fn step_status_is_settled_from_counters(
        #[case] stopped: bool,
        #[case] chunk_failed: bool,
        #[case] exit: Option<&str>,
        #[case] expected: BatchStatus,
    ) {
        let mut step = StepExecution::new("retryStep", at(0));
        if chunk_failed {
            step.failed_chunk_count = 1;
            step.failures.push(failure());
        }
        step.exit_message = exit.map(str::to_string);

        step.finish(stopped, at(5));

        assert_eq!(step.status, expected);
        assert_eq!(step.ended_at, Some(at(5)));
    }

    #[test]
    fn job_execution_takes_its_status_from_the_step() {
        let mut exec = JobExecution::new(
            JobExecutionId::from_ulid(Ulid::new()),
            JobInstanceId::from_ulid(Ulid::new()),
            "main_job",
            JobParameters::new().with_long("time", 1),
            at(0),
        );
        assert_eq!(exec.status, BatchStatus::Starting);

        exec.mark_started(at(1));
        assert!(exec.status.is_running());

        let mut step = StepExecution::new("retryStep", at(1));
        step.finish(false, at(2));
        exec.finish(step, at(2));

        assert_eq!(exec.status, BatchStatus::Completed);
        assert!(exec.status.is_terminal());
        assert_eq!(exec.ended_at, Some(at(2)));
    }

    #[test]
    fn stopping_only_applies_to_running_executions() {
        let mut exec = JobExecution::new(
            JobExecutionId::from_ulid(Ulid::new()),
            JobInstanceId::from_ulid(Ulid::new()),
            "main_job",
            JobParameters::new(),
            at(0),
        );
        exec.mark_started(at(0));
        exec.mark_stopping();
        assert_eq!(exec.status, BatchStatus::Stopping);

        exec.status = BatchStatus::Completed;
        exec.mark_stopping();
        assert_eq!(exec.status, BatchStatus::Completed);
    }

    #[test]
    fn status_serializes_in_screaming_case() {
        let json = serde_json::to_string(&BatchStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
