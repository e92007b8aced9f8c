//! Structured lifecycle events for pipeline runs.
//!
//! This module provides:
//! - A run-scoped tracing span carrying the run id
//! - Emission functions for the key points of a run: trigger, steps, gate,
//!   version, upload skip and finish
//!
//! Events are emitted at `info!` level with an `event` field, so they can be
//! filtered out of JSON logs by name.

use tracing::{info, warn};

/// Run-scoped span; attach it to the run's future with
/// `tracing::Instrument` so every event below carries `run_id`.
///
/// ```ignore
/// pipeline.execute(event).instrument(run_span("0b6f...")).await
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("shipline.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, trigger: &str, branch: &str) {
    info!(event = "run.started", run_id = %run_id, trigger = %trigger, branch = %branch);
}

/// Emit event: trigger filter decision.
pub fn emit_trigger_evaluated(run: bool, marker: &str) {
    info!(event = "trigger.evaluated", run = run, marker = %marker);
}

pub fn emit_step_started(step: &str) {
    info!(event = "step.started", step = %step);
}

/// Emit event: a step finished. Failures are logged at warn level.
pub fn emit_step_finished(step: &str, exit_code: i32, duration_ms: u64) {
    if exit_code == 0 {
        info!(event = "step.finished", step = %step, exit_code = exit_code, duration_ms = duration_ms);
    } else {
        warn!(event = "step.finished", step = %step, exit_code = exit_code, duration_ms = duration_ms);
    }
}

pub fn emit_gate_evaluated(branch: &str, passed: bool, reason: Option<&str>) {
    info!(
        event = "gate.evaluated",
        branch = %branch,
        passed = passed,
        reason = reason.unwrap_or("-"),
    );
}

pub fn emit_version_resolved(version: &str, previous: Option<&str>, commits: usize) {
    info!(
        event = "version.resolved",
        version = %version,
        previous = previous.unwrap_or("-"),
        commits = commits,
    );
}

/// Emit event: upload skipped because the index already has the artifact.
pub fn emit_upload_skipped(name: &str) {
    info!(event = "upload.skipped", artifact = %name, reason = "already published");
}

pub fn emit_run_finished(run_id: &str, outcome: &str, duration_ms: u64) {
    info!(event = "run.finished", run_id = %run_id, outcome = %outcome, duration_ms = duration_ms);
}

/// Emit event: run failed (warning level).
pub fn emit_run_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.failed", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        run_span("test-run-id").in_scope(|| {
            emit_step_started("format");
            emit_step_finished("format", 0, 12);
            emit_step_finished("test", 101, 40);
        });
    }
}
