//! Values passed between pipeline steps.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::version::VersionString;

/// A packaged release artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// `{project}-{version}`.
    pub name: String,
    pub version: VersionString,
    pub path: PathBuf,
}

impl ArtifactRef {
    pub fn new(project: &str, version: &VersionString, path: PathBuf) -> Self {
        Self {
            name: artifact_name(project, version),
            version: version.clone(),
            path,
        }
    }
}

/// Artifact name for a project at a version.
pub fn artifact_name(project: &str, version: &VersionString) -> String {
    format!("{project}-{version}")
}

/// Generated documentation, ready to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocArtifact {
    pub path: PathBuf,
}

/// Captured result of one delegated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub step: String,

    /// Exit code (0 = success, -1 = killed or never started).
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl StepOutput {
    /// A successful step with no captured output.
    pub fn ok(step: &str) -> Self {
        Self {
            step: step.to_string(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    /// A failed step whose diagnostic is `stderr`.
    pub fn failed(step: &str, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Tool output to show the operator on failure, verbatim.
    ///
    /// Prefers stderr; falls back to stdout for tools that report there.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim_end();
        let stdout = self.stdout.trim_end();
        match (stderr.is_empty(), stdout.is_empty()) {
            (false, _) => stderr.to_string(),
            (true, false) => stdout.to_string(),
            (true, true) => format!("{} exited with code {}", self.step, self.exit_code),
        }
    }
}
