//! Validation stage: format, lint, test, stopping at the first failure.

use shipline_core::obs;
use shipline_core::{Result, ShiplineError, StepOutput, Toolchain, VersionControl};

use crate::context::RunContext;
use crate::stage::ValidationStep;

pub struct ValidationStage<'a> {
    toolchain: &'a dyn Toolchain,
    vcs: &'a dyn VersionControl,
}

impl<'a> ValidationStage<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, vcs: &'a dyn VersionControl) -> Self {
        Self { toolchain, vcs }
    }

    /// Run every sub-step in order.
    ///
    /// The first failing sub-step ends the stage with its diagnostic,
    /// verbatim. After formatting, the modified files are captured in the
    /// run context for the self-commit.
    pub async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        for step in ValidationStep::ORDER {
            obs::emit_step_started(step.name());
            let output = match self.invoke(step).await {
                Ok(output) => output,
                Err(e) => StepOutput::failed(step.name(), -1, e.to_string()),
            };
            let passed = output.passed();
            let diagnostic = output.diagnostic();
            ctx.record(output);

            if !passed {
                return Err(ShiplineError::Validation {
                    step: step.name().to_string(),
                    diagnostic,
                });
            }

            if step == ValidationStep::Format {
                ctx.formatted_files = self.vcs.changed_files().await?;
                tracing::info!(files = ctx.formatted_files.len(), "formatter modified files");
            }
        }
        Ok(())
    }

    async fn invoke(&self, step: ValidationStep) -> Result<StepOutput> {
        match step {
            ValidationStep::Format => self.toolchain.format().await,
            ValidationStep::Lint => self.toolchain.lint().await,
            ValidationStep::Test => self.toolchain.test().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipline_core::fakes::{CallLog, FakeToolchain, MemoryVersionControl};
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_all_steps_run_in_order() {
        let log = CallLog::new();
        let toolchain = FakeToolchain::new(log.clone());
        let vcs = MemoryVersionControl::new(log.clone()).with_dirty(&["src/lib.rs"]);
        let mut ctx = RunContext::new("run");

        ValidationStage::new(&toolchain, &vcs).run(&mut ctx).await.unwrap();

        assert_eq!(
            log.entries(),
            vec!["toolchain.format", "toolchain.lint", "toolchain.test"]
        );
        assert_eq!(ctx.formatted_files, vec![PathBuf::from("src/lib.rs")]);
        assert_eq!(ctx.steps().len(), 3);
    }

    #[tokio::test]
    async fn test_lint_failure_stops_before_tests() {
        let log = CallLog::new();
        let toolchain = FakeToolchain::new(log.clone());
        toolchain.fail_step("lint");
        let vcs = MemoryVersionControl::new(log.clone());
        let mut ctx = RunContext::new("run");

        let err = ValidationStage::new(&toolchain, &vcs)
            .run(&mut ctx)
            .await
            .unwrap_err();

        match err {
            ShiplineError::Validation { step, diagnostic } => {
                assert_eq!(step, "lint");
                assert_eq!(diagnostic, "lint failed (fake)");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!log.contains("toolchain.test"));
        assert_eq!(ctx.steps().last().unwrap().exit_code, 1);
    }
}
