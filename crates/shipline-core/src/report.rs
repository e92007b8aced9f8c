//! Run report: what a pipeline run did, serializable for CI artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::artifact::{ArtifactRef, StepOutput};
use crate::error::Result;
use crate::event::PipelineEvent;
use crate::publish_gate::BlockReason;
use crate::version::VersionString;

/// What the release path produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub version: VersionString,
    pub previous_version: Option<String>,
    pub artifact: ArtifactRef,
    /// SHA-256 of the archive, when it was readable after packaging.
    pub artifact_sha256: Option<String>,
    /// The index already had this name+version.
    pub upload_skipped: bool,
    pub docs_target: String,
    /// Self-commit id; `None` when there was nothing to commit.
    pub commit: Option<String>,
    pub tag: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The trigger filter dropped the event; nothing ran.
    Skipped { reason: BlockReason },
    /// Validation passed and the publish gate stayed closed.
    Validated { blocked_by: BlockReason },
    Released(ReleaseSummary),
    Failed { error: String, exit_code: i32 },
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Skipped { .. } => "skipped",
            RunOutcome::Validated { .. } => "validated",
            RunOutcome::Released(_) => "released",
            RunOutcome::Failed { .. } => "failed",
        }
    }

    /// Gate skips are successful runs.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Failed { exit_code, .. } => *exit_code,
            _ => 0,
        }
    }
}

/// Full record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub event: PipelineEvent,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepOutput>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(outcome: RunOutcome) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: "run-1".to_string(),
            event: PipelineEvent::push("main", "fix bug"),
            started_at: now,
            finished_at: now,
            steps: vec![StepOutput::ok("format")],
            outcome,
        }
    }

    #[test]
    fn test_gate_skips_exit_zero() {
        let skipped = RunOutcome::Skipped {
            reason: BlockReason::SkipMarker,
        };
        let validated = RunOutcome::Validated {
            blocked_by: BlockReason::NotReleaseBranch,
        };
        assert_eq!(skipped.exit_code(), 0);
        assert_eq!(validated.exit_code(), 0);
        let failed = RunOutcome::Failed {
            error: "boom".to_string(),
            exit_code: 4,
        };
        assert_eq!(failed.exit_code(), 4);
    }

    #[test]
    fn test_report_json_shape() {
        let version: VersionString = "1.4.0".parse().unwrap();
        let outcome = RunOutcome::Released(ReleaseSummary {
            version: version.clone(),
            previous_version: Some("1.3.7".to_string()),
            artifact: ArtifactRef::new("proj", &version, PathBuf::from("dist/proj-1.4.0.tar.gz")),
            artifact_sha256: None,
            upload_skipped: false,
            docs_target: "gh-pages".to_string(),
            commit: Some("abc".to_string()),
            tag: "1.4.0".to_string(),
        });
        let value = serde_json::to_value(report(outcome)).unwrap();
        assert_eq!(value["outcome"]["status"], "released");
        assert_eq!(value["outcome"]["version"], "1.4.0");
        assert_eq!(value["outcome"]["artifact"]["name"], "proj-1.4.0");
        assert_eq!(value["event"]["trigger_kind"], "push");
    }

    #[test]
    fn test_write_json_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        let r = report(RunOutcome::Skipped {
            reason: BlockReason::SkipMarker,
        });
        r.write_json(&path).unwrap();
        let back: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, r);
    }
}
