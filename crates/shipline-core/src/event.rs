//! Pipeline events and the trigger filter.
//!
//! The trigger filter is the loop-breaker: commits made by the pipeline
//! itself carry the skip marker, so the event they produce is dropped here
//! before any side-effecting stage runs.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ShiplineError};

/// Sentinel that suppresses a pipeline run when present in a commit message.
pub const DEFAULT_SKIP_MARKER: &str = "[skip ci]";

/// What kind of repository change produced the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Push,
    MergeRequest,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Push => "push",
            TriggerKind::MergeRequest => "merge_request",
        }
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = ShiplineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "push" => Ok(TriggerKind::Push),
            "merge_request" | "pull_request" => Ok(TriggerKind::MergeRequest),
            other => Err(ShiplineError::Config(format!(
                "unknown trigger kind '{other}' (expected push or merge_request)"
            ))),
        }
    }
}

/// One repository change event, supplied by the CI executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineEvent {
    pub trigger_kind: TriggerKind,
    /// Pushed branch, or the target branch of a merge request.
    pub branch: String,
    /// Message of the latest commit; absent when the executor did not supply one.
    #[serde(default)]
    pub head_commit_message: Option<String>,
}

impl PipelineEvent {
    pub fn new(trigger_kind: TriggerKind, branch: impl Into<String>, message: Option<String>) -> Self {
        Self {
            trigger_kind,
            branch: branch.into(),
            head_commit_message: message,
        }
    }

    /// Shorthand for a push event.
    pub fn push(branch: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(TriggerKind::Push, branch, Some(message.into()))
    }

    /// Load an event from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Whether the head commit carries `marker`.
    ///
    /// A missing message counts as marker-absent.
    pub fn has_skip_marker(&self, marker: &str) -> bool {
        match &self.head_commit_message {
            Some(message) if !marker.is_empty() => message.contains(marker),
            _ => false,
        }
    }
}

/// Trigger filter: whether the pipeline runs at all for `event`.
pub fn should_run(event: &PipelineEvent, marker: &str) -> bool {
    !event.has_skip_marker(marker)
}
