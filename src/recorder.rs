//! Recording interface for pipeline execution.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{debug, info, warn};

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub i64);

/// Status of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Run completed successfully.
    Completed,
    /// Run failed.
    Failed { error: String },
}

/// Status of a completed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Step completed successfully.
    Completed,
    /// Step failed.
    Failed { error: String },
}

/// Observes pipeline execution.
///
/// Hooks are called from whichever thread delivers the completion, so
/// implementations must not block.
pub trait Recorder: Send + Sync {
    /// Record the start of a pipeline run.
    fn start_run(&self, pipeline_name: &str) -> RunId;

    /// Record the start of a step.
    fn start_step(&self, run_id: RunId, step_name: &str, step_index: usize);

    /// Record step completion.
    fn complete_step(&self, run_id: RunId, step_name: &str, step_index: usize, status: &StepStatus);

    /// Record run completion.
    fn complete_run(&self, run_id: RunId, status: &RunStatus);
}

/// A no-op recorder that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopRecorder;

impl NoopRecorder {
    /// Create a new no-op recorder.
    pub fn new() -> Self {
        Self
    }
}

impl Recorder for NoopRecorder {
    fn start_run(&self, _pipeline_name: &str) -> RunId {
        RunId(0)
    }

    fn start_step(&self, _run_id: RunId, _step_name: &str, _step_index: usize) {}

    fn complete_step(
        &self,
        _run_id: RunId,
        _step_name: &str,
        _step_index: usize,
        _status: &StepStatus,
    ) {
    }

    fn complete_run(&self, _run_id: RunId, _status: &RunStatus) {}
}

/// Emits every pipeline event through `tracing`.
///
/// Step events can be narrowed to steps whose name starts with a prefix.
#[derive(Debug, Default)]
pub struct TracingRecorder {
    next_run: AtomicI64,
    filter: Option<String>,
}

impl TracingRecorder {
    /// Create a recorder that logs every step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only trace steps whose name starts with `prefix`.
    pub fn with_filter(mut self, prefix: impl Into<String>) -> Self {
        self.filter = Some(prefix.into());
        self
    }

    fn traces(&self, step_name: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |prefix| step_name.starts_with(prefix))
    }
}

impl Recorder for TracingRecorder {
    fn start_run(&self, pipeline_name: &str) -> RunId {
        let run_id = RunId(self.next_run.fetch_add(1, Ordering::Relaxed) + 1);
        info!(pipeline = pipeline_name, run = run_id.0, "Starting pipeline run");
        run_id
    }

    fn start_step(&self, run_id: RunId, step_name: &str, step_index: usize) {
        if self.traces(step_name) {
            debug!(run = run_id.0, step = step_name, index = step_index, "Invoking step");
        }
    }

    fn complete_step(&self, run_id: RunId, step_name: &str, step_index: usize, status: &StepStatus) {
        if !self.traces(step_name) {
            return;
        }
        match status {
            StepStatus::Completed => {
                debug!(run = run_id.0, step = step_name, index = step_index, "Step completed")
            }
            StepStatus::Failed { error } => warn!(
                run = run_id.0,
                step = step_name,
                index = step_index,
                error = %error,
                "Step failed"
            ),
        }
    }

    fn complete_run(&self, run_id: RunId, status: &RunStatus) {
        match status {
            RunStatus::Completed => info!(run = run_id.0, "Pipeline run completed"),
            RunStatus::Failed { error } => warn!(run = run_id.0, error = %error, "Pipeline run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_increase() {
        let recorder = TracingRecorder::new();
        assert_eq!(recorder.start_run("a"), RunId(1));
        assert_eq!(recorder.start_run("b"), RunId(2));
    }

    #[test]
    fn test_filter_matches_prefix() {
        let recorder = TracingRecorder::new().with_filter("fetch_");
        assert!(recorder.traces("fetch_users"));
        assert!(!recorder.traces("render"));
        assert!(TracingRecorder::new().traces("anything"));
    }
}
