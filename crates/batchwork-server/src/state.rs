use std::sync::Arc;

use batchwork_core::app::JobLauncher;
use batchwork_core::ports::Clock;

#[derive(Clone)]
pub struct AppState {
    pub launcher: Arc<JobLauncher>,

    /// Source of the `time` launch parameter.
    pub clock: Arc<dyn Clock>,
}
