//! Release pipeline orchestration.
//!
//! One linear sequence per event:
//! trigger filter -> validation -> publish gate -> version resolver ->
//! release executor -> self-commit guard. The first failure ends the run;
//! a closed filter or gate ends it successfully. The gate is only evaluated
//! once validation has passed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shipline_core::obs;
use shipline_core::{
    evaluate_publish_gate, should_run, BlockReason, PackageIndex, PipelineEvent, PublishVerdict,
    ReleaseSummary, Result, RunOutcome, RunReport, ShiplineConfig, Toolchain, VersionControl,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::commit_guard::SelfCommitGuard;
use crate::context::RunContext;
use crate::release::ReleaseExecutor;
use crate::resolver::VersionResolver;
use crate::validation::ValidationStage;

/// Trigger filter and publish gate decisions for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDecision {
    /// Whether the pipeline runs at all.
    pub run: bool,
    pub gate: PublishVerdict,
}

/// Evaluate the trigger filter and the publish gate up front, without
/// running anything. Pure.
pub fn evaluate_trigger(config: &ShiplineConfig, event: &PipelineEvent) -> TriggerDecision {
    let run = should_run(event, &config.skip_marker);
    TriggerDecision {
        run,
        gate: publish_verdict(config, event, !run),
    }
}

fn publish_verdict(config: &ShiplineConfig, event: &PipelineEvent, skip: bool) -> PublishVerdict {
    evaluate_publish_gate(event.trigger_kind, &event.branch, skip, &config.release_branches)
}

/// Release pipeline over a set of collaborators.
pub struct ReleasePipeline {
    config: ShiplineConfig,
    workdir: PathBuf,
    toolchain: Arc<dyn Toolchain>,
    index: Arc<dyn PackageIndex>,
    vcs: Arc<dyn VersionControl>,
}

impl ReleasePipeline {
    pub fn new(
        config: ShiplineConfig,
        workdir: impl Into<PathBuf>,
        toolchain: Arc<dyn Toolchain>,
        index: Arc<dyn PackageIndex>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self {
            config,
            workdir: workdir.into(),
            toolchain,
            index,
            vcs,
        }
    }

    pub fn config(&self) -> &ShiplineConfig {
        &self.config
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Path of the version metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.workdir.join(&self.config.version.metadata_file)
    }

    pub fn resolver(&self) -> VersionResolver<'_> {
        VersionResolver::new(&self.config, self.vcs.as_ref(), self.metadata_path())
    }

    /// Run the pipeline for `event`. Failures are captured in the report.
    pub async fn run(&self, event: &PipelineEvent) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);

        async move {
            let started_at = Utc::now();
            obs::emit_run_started(&run_id, event.trigger_kind.as_str(), &event.branch);

            let mut ctx = RunContext::new(run_id.clone());
            let outcome = match self.execute(event, &mut ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    obs::emit_run_failed(&run_id, &e);
                    RunOutcome::Failed {
                        error: e.to_string(),
                        exit_code: e.exit_code(),
                    }
                }
            };

            let report = RunReport {
                run_id: run_id.clone(),
                event: event.clone(),
                started_at,
                finished_at: Utc::now(),
                steps: ctx.into_steps(),
                outcome,
            };
            obs::emit_run_finished(&run_id, report.outcome.label(), report.duration_ms());
            report
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, event: &PipelineEvent, ctx: &mut RunContext) -> Result<RunOutcome> {
        let run = should_run(event, &self.config.skip_marker);
        obs::emit_trigger_evaluated(run, &self.config.skip_marker);
        if !run {
            return Ok(RunOutcome::Skipped {
                reason: BlockReason::SkipMarker,
            });
        }

        ValidationStage::new(self.toolchain.as_ref(), self.vcs.as_ref())
            .run(ctx)
            .await?;

        let verdict = publish_verdict(&self.config, event, false);
        let reason = verdict.blocked_by.map(|r| r.to_string());
        obs::emit_gate_evaluated(&event.branch, verdict.passed, reason.as_deref());
        if let Some(blocked_by) = verdict.blocked_by {
            return Ok(RunOutcome::Validated { blocked_by });
        }

        let resolver = self.resolver();
        let resolution = ctx.track("version", resolver.apply()).await?;
        ctx.version = Some(resolution.version.clone());

        let release = ReleaseExecutor::new(
            self.toolchain.as_ref(),
            self.index.as_ref(),
            &self.config.project_name,
            &self.config.doc_hosting_target,
            &self.workdir,
        )
        .execute(ctx)
        .await?;

        let version = ctx.resolved_version()?;
        let mut paths = ctx.formatted_files.clone();
        paths.push(resolver.metadata_file().to_path_buf());
        let mut guard = SelfCommitGuard::new(
            self.vcs.as_ref(),
            &self.config.commit_summary,
            &self.config.skip_marker,
            &self.config.tag_prefix,
        );
        let committed = ctx
            .track("commit", guard.finalize(&event.branch, &version, &paths))
            .await?;

        Ok(RunOutcome::Released(ReleaseSummary {
            version,
            previous_version: resolution.previous.map(|t| t.version.to_string()),
            artifact: release.artifact,
            artifact_sha256: release.artifact_sha256,
            upload_skipped: release.upload_skipped,
            docs_target: self.config.doc_hosting_target.clone(),
            commit: committed.commit,
            tag: committed.tag,
        }))
    }
}
