use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use batchwork_core::domain::{JobExecution, JobExecutionId, JobParameters};
use batchwork_core::error::LaunchError;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::AppState;

pub const LAUNCHED: &str = "Launched";
pub const FAILED: &str = "Failed";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/launch/:id", get(launch))
        .route("/api/v1/executions", get(list_executions))
        .route("/api/v1/executions/:id", get(get_execution))
        .route("/api/v1/executions/:id/stop", post(stop_execution))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// Launches one run with fresh parameters and answers without waiting for it.
async fn launch(State(state): State<AppState>, Path(id): Path<String>) -> &'static str {
    let params = JobParameters::fresh(state.clock.as_ref());
    match state.launcher.launch(params).await {
        Ok(execution) => {
            info!(request = %id, %execution, "launch accepted");
            LAUNCHED
        }
        Err(e) => {
            warn!(request = %id, error = %e, "launch failed");
            FAILED
        }
    }
}

async fn list_executions(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobExecution>>, StatusCode> {
    state
        .launcher
        .executions()
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobExecution>, StatusCode> {
    let id: JobExecutionId = id.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    state
        .launcher
        .execution(id)
        .await
        .map(Json)
        .map_err(|_| StatusCode::NOT_FOUND)
}

async fn stop_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    let Ok(id) = id.parse::<JobExecutionId>() else {
        return StatusCode::BAD_REQUEST;
    };
    match state.launcher.stop(id).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(LaunchError::NotRunning(_)) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!(execution = %id, error = %e, "stop failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, Response};
    use batchwork_core::app::{Job, JobLauncher, StepBuilder};
    use batchwork_core::domain::{BatchStatus, ProcessOutcome, Task};
    use batchwork_core::impls::{CompleteTask, InMemoryJobStore, InMemorySink, InMemorySource};
    use batchwork_core::ports::{ItemProcessor, SystemClock};
    use tower::ServiceExt;

    fn state_with(tasks: Vec<Task>) -> AppState {
        let step = StepBuilder::new("retryStep")
            .source(InMemorySource::new(tasks))
            .processor(CompleteTask::default())
            .sink(InMemorySink::new())
            .build()
            .unwrap();
        let launcher = JobLauncher::new(
            Job::new("main_job", step),
            Arc::new(InMemoryJobStore::new()),
            Arc::new(SystemClock),
        );
        AppState {
            launcher: Arc::new(launcher),
            clock: Arc::new(SystemClock),
        }
    }

    async fn send(state: &AppState, method: &str, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = send(&state_with(vec![]), "GET", "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn every_launch_gets_fresh_parameters() {
        let state = state_with(vec![Task::new("t1")]);

        for _ in 0..2 {
            let response = send(&state, "GET", "/launch/abc").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, LAUNCHED);
        }

        let executions = state.launcher.executions().await.unwrap();
        assert_eq!(executions.len(), 2);
        assert_ne!(executions[0].parameters, executions[1].parameters);
        assert!(executions[0].parameters.get_long("time").is_some());
        assert!(executions[0].parameters.get_string("random").is_some());
    }

    #[tokio::test]
    async fn launch_reports_failed_when_the_launcher_refuses() {
        let state = state_with(vec![Task::new("t1")]);
        state.launcher.shutdown().await;

        let response = send(&state, "GET", "/launch/abc").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, FAILED);
    }

    #[tokio::test]
    async fn execution_view_reports_the_outcome() {
        let state = state_with(vec![Task::new("t1")]);
        let execution = state
            .launcher
            .run(JobParameters::new().with_long("time", 1))
            .await
            .unwrap();

        let response = send(&state, "GET", &format!("/api/v1/executions/{}", execution.id)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let view: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(view["status"], "COMPLETED");
        assert_eq!(view["step"]["write_count"], 1);
        assert_eq!(view["parameters"]["time"], 1);
    }

    #[tokio::test]
    async fn execution_lookup_distinguishes_bad_and_unknown_ids() {
        let state = state_with(vec![]);

        let response = send(&state, "GET", "/api/v1/executions/not-an-id").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unknown: JobExecutionId = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
        let response = send(&state, "GET", &format!("/api/v1/executions/{unknown}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stop_answers_404_for_finished_executions() {
        let state = state_with(vec![Task::new("t1")]);
        let execution = state.launcher.run(JobParameters::new()).await.unwrap();
        assert_eq!(execution.status, BatchStatus::Completed);

        let response = send(
            &state,
            "POST",
            &format!("/api/v1/executions/{}/stop", execution.id),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stop_accepts_running_executions() {
        struct Slow;

        #[async_trait::async_trait]
        impl ItemProcessor<Task, Task> for Slow {
            async fn process(&self, task: Task) -> ProcessOutcome<Task> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                CompleteTask::default().process(task).await
            }
        }

        let step = StepBuilder::new("retryStep")
            .source(InMemorySource::new(vec![Task::new("t1"), Task::new("t2")]))
            .processor(Slow)
            .sink(InMemorySink::new())
            .build()
            .unwrap();
        let state = AppState {
            launcher: Arc::new(JobLauncher::new(
                Job::new("main_job", step),
                Arc::new(InMemoryJobStore::new()),
                Arc::new(SystemClock),
            )),
            clock: Arc::new(SystemClock),
        };
        let id = state.launcher.launch(JobParameters::new()).await.unwrap();

        let response = send(&state, "POST", &format!("/api/v1/executions/{id}/stop")).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let view = state.launcher.execution(id).await.unwrap();
        assert_eq!(view.status, BatchStatus::Stopping);
    }
}
