//! Publish gate.
//!
//! Evaluates a [`ReleaseDecision`] against the configured release branches
//! to produce a [`PublishVerdict`], the pass/fail decision that allows or
//! blocks the release path. Evaluated fresh on every run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::event::TriggerKind;

// ---------------------------------------------------------------------------
// Decision (input to the gate)
// ---------------------------------------------------------------------------

/// Facts the gate decides on. Derived per run, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseDecision {
    pub is_release_branch: bool,
    /// Merge-request checkouts are unmerged and never publish.
    pub is_merge_request: bool,
    pub skip: bool,
}

impl ReleaseDecision {
    pub fn new(
        trigger: TriggerKind,
        branch: &str,
        skip: bool,
        release_branches: &BTreeSet<String>,
    ) -> Self {
        Self {
            is_release_branch: release_branches.contains(branch),
            is_merge_request: trigger == TriggerKind::MergeRequest,
            skip,
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why the gate blocked the release path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    SkipMarker,
    MergeRequest,
    NotReleaseBranch,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::SkipMarker => write!(f, "head commit carries the skip marker"),
            BlockReason::MergeRequest => write!(f, "merge requests are validated only"),
            BlockReason::NotReleaseBranch => write!(f, "branch is not a release branch"),
        }
    }
}

/// The outcome of evaluating the publish gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishVerdict {
    pub passed: bool,
    pub blocked_by: Option<BlockReason>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate the gate: passes iff `!skip && trigger == Push && branch ∈ release_branches`.
pub fn evaluate_publish_gate(
    trigger: TriggerKind,
    branch: &str,
    skip: bool,
    release_branches: &BTreeSet<String>,
) -> PublishVerdict {
    let decision = ReleaseDecision::new(trigger, branch, skip, release_branches);
    evaluate_decision(&decision)
}

/// Evaluate an already derived [`ReleaseDecision`].
pub fn evaluate_decision(decision: &ReleaseDecision) -> PublishVerdict {
    let blocked_by = if decision.skip {
        Some(BlockReason::SkipMarker)
    } else if decision.is_merge_request {
        Some(BlockReason::MergeRequest)
    } else if !decision.is_release_branch {
        Some(BlockReason::NotReleaseBranch)
    } else {
        None
    };

    PublishVerdict {
        passed: blocked_by.is_none(),
        blocked_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branches(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_release_branch_without_skip_passes() {
        let set = branches(&["main", "master"]);
        let verdict = evaluate_publish_gate(TriggerKind::Push, "main", false, &set);
        assert!(verdict.passed);
        assert!(verdict.blocked_by.is_none());
    }

    #[test]
    fn test_feature_branch_blocked() {
        let set = branches(&["main"]);
        let verdict = evaluate_publish_gate(TriggerKind::Push, "feature/x", false, &set);
        assert!(!verdict.passed);
        assert_eq!(verdict.blocked_by, Some(BlockReason::NotReleaseBranch));
    }

    #[test]
    fn test_skip_blocks_even_on_release_branch() {
        let set = branches(&["main"]);
        let verdict = evaluate_publish_gate(TriggerKind::Push, "main", true, &set);
        assert!(!verdict.passed);
        assert_eq!(verdict.blocked_by, Some(BlockReason::SkipMarker));
    }

    #[test]
    fn test_branch_match_is_exact() {
        let set = branches(&["main"]);
        assert!(!evaluate_publish_gate(TriggerKind::Push, "main2", false, &set).passed);
        assert!(!evaluate_publish_gate(TriggerKind::Push, "Main", false, &set).passed);
        assert!(!evaluate_publish_gate(TriggerKind::Push, "refs/heads/main", false, &set).passed);
    }

    #[test]
    fn test_empty_release_set_never_passes() {
        let verdict = evaluate_publish_gate(TriggerKind::Push, "main", false, &BTreeSet::new());
        assert!(!verdict.passed);
    }

    #[test]
    fn test_merge_request_to_release_branch_blocked() {
        let set = branches(&["main"]);
        let verdict = evaluate_publish_gate(TriggerKind::MergeRequest, "main", false, &set);
        assert!(!verdict.passed);
        assert_eq!(verdict.blocked_by, Some(BlockReason::MergeRequest));

        let verdict = evaluate_publish_gate(TriggerKind::MergeRequest, "main", true, &set);
        assert_eq!(verdict.blocked_by, Some(BlockReason::SkipMarker));
    }

    #[test]
    fn test_gate_is_truth_table() {
        let set = branches(&["main"]);
        for (branch, skip, expected) in [
            ("main", false, true),
            ("main", true, false),
            ("dev", false, false),
            ("dev", true, false),
        ] {
            assert_eq!(
                evaluate_publish_gate(TriggerKind::Push, branch, skip, &set).passed,
                expected,
                "branch={branch} skip={skip}"
            );
        }
    }
}
