//! Per-run state threaded explicitly through the pipeline.

use shipline_core::obs;
use shipline_core::{Result, ShiplineError, StepOutput, VersionString};
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

/// State owned by one pipeline run and dropped at its end.
#[derive(Debug, Default)]
pub struct RunContext {
    pub run_id: String,

    /// Files the format step rewrote; staged by the self-commit.
    pub formatted_files: Vec<PathBuf>,

    /// Set once the version resolver has run; read by packaging, upload
    /// and tagging.
    pub version: Option<VersionString>,

    steps: Vec<StepOutput>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// The version resolved for this run.
    pub fn resolved_version(&self) -> Result<VersionString> {
        self.version.clone().ok_or_else(|| {
            ShiplineError::VersionResolution("no version has been resolved for this run".to_string())
        })
    }

    /// Record a finished step and emit its lifecycle event.
    pub fn record(&mut self, output: StepOutput) {
        obs::emit_step_finished(&output.step, output.exit_code, output.duration_ms);
        self.steps.push(output);
    }

    /// Run a step that reports success as `Ok`, timing it and recording the
    /// outcome. The error is returned unchanged.
    pub async fn track<T, F>(&mut self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        obs::emit_step_started(step);
        let start = Instant::now();
        let result = fut.await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut output = match &result {
            Ok(_) => StepOutput::ok(step),
            Err(e) => StepOutput::failed(step, 1, e.to_string()),
        };
        output.duration_ms = duration_ms;
        self.record(output);
        result
    }

    pub fn steps(&self) -> &[StepOutput] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<StepOutput> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_records_success_and_failure() {
        let mut ctx = RunContext::new("run-1");
        let value = ctx.track("docs", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .track::<(), _>("package", async {
                Err(ShiplineError::Command("tar: no space left".to_string()))
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no space left"));

        let steps = ctx.steps();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].passed());
        assert_eq!(steps[1].step, "package");
        assert!(steps[1].diagnostic().contains("no space left"));
    }

    #[test]
    fn test_resolved_version_requires_resolver() {
        let mut ctx = RunContext::new("run-2");
        let err = ctx.resolved_version().unwrap_err();
        assert_eq!(err.exit_code(), 3);

        ctx.version = Some("1.4.0".parse().unwrap());
        assert_eq!(ctx.resolved_version().unwrap().to_string(), "1.4.0");
    }
}
