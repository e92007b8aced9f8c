//! Self-commit guard.
//!
//! After a release, stages exactly the files the pipeline mutated, commits
//! them with a message carrying the skip marker, pushes, then tags the
//! release. The marker is what keeps the pushed commit from triggering the
//! pipeline again.

use serde::{Deserialize, Serialize};
use shipline_core::{tag_name, Result, VersionControl, VersionString};
use std::path::PathBuf;

/// Guard lifecycle. Every run returns to `Idle`, on success and on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Idle,
    Committing,
    Tagging,
}

/// What the guard wrote to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// `None` when the release changed nothing tracked.
    pub commit: Option<String>,
    pub tag: String,
}

/// Self-commit message: the summary with `{version}` filled in, followed by
/// the marker.
pub fn commit_message(summary: &str, version: &VersionString, marker: &str) -> String {
    let summary = summary.replace("{version}", &version.to_string());
    format!("{} {marker}", summary.trim_end())
}

pub struct SelfCommitGuard<'a> {
    vcs: &'a dyn VersionControl,
    summary: &'a str,
    marker: &'a str,
    tag_prefix: &'a str,
    state: GuardState,
}

impl<'a> SelfCommitGuard<'a> {
    pub fn new(vcs: &'a dyn VersionControl, summary: &'a str, marker: &'a str, tag_prefix: &'a str) -> Self {
        Self {
            vcs,
            summary,
            marker,
            tag_prefix,
            state: GuardState::Idle,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Commit `paths`, push to `branch`, then create and push the tag.
    ///
    /// With nothing staged the commit and branch push are skipped and the
    /// tag lands on the current HEAD. A rejected push fails without retry.
    pub async fn finalize(
        &mut self,
        branch: &str,
        version: &VersionString,
        paths: &[PathBuf],
    ) -> Result<CommitOutcome> {
        let result = self.commit_and_tag(branch, version, paths).await;
        self.transition(GuardState::Idle);
        result
    }

    async fn commit_and_tag(
        &mut self,
        branch: &str,
        version: &VersionString,
        paths: &[PathBuf],
    ) -> Result<CommitOutcome> {
        self.transition(GuardState::Committing);

        let mut unique: Vec<PathBuf> = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(path) {
                unique.push(path.clone());
            }
        }
        self.vcs.stage(&unique).await?;

        let commit = if self.vcs.has_staged_changes().await? {
            let message = commit_message(self.summary, version, self.marker);
            let id = self.vcs.commit(&message).await?;
            tracing::info!(commit = %id, branch = %branch, "pushing release commit");
            self.vcs.push(branch).await?;
            Some(id)
        } else {
            tracing::info!("release changed no tracked files; nothing to commit");
            None
        };

        self.transition(GuardState::Tagging);
        let tag = tag_name(self.tag_prefix, version);
        self.vcs
            .create_tag(&tag, &format!("Release {version} {}", self.marker))
            .await?;
        self.vcs.push_tag(&tag).await?;

        Ok(CommitOutcome { commit, tag })
    }

    fn transition(&mut self, next: GuardState) {
        tracing::debug!(from = ?self.state, to = ?next, "commit guard");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipline_core::fakes::{CallLog, MemoryVersionControl};
    use shipline_core::{should_run, PipelineEvent, ShiplineError, DEFAULT_SKIP_MARKER};

    const SUMMARY: &str = "ci: format code, release {version}, refresh docs";

    fn version(s: &str) -> VersionString {
        s.parse().unwrap()
    }

    #[test]
    fn test_commit_message_ends_with_marker() {
        let msg = commit_message(SUMMARY, &version("1.4.0"), DEFAULT_SKIP_MARKER);
        assert_eq!(msg, "ci: format code, release 1.4.0, refresh docs [skip ci]");
    }

    #[test]
    fn test_commit_message_fed_back_does_not_run() {
        let msg = commit_message(SUMMARY, &version("2.0.0"), DEFAULT_SKIP_MARKER);
        let event = PipelineEvent::push("main", msg);
        assert!(!should_run(&event, DEFAULT_SKIP_MARKER));
    }

    #[tokio::test]
    async fn test_commit_push_then_tag() {
        let log = CallLog::new();
        let vcs = MemoryVersionControl::new(log.clone());
        let mut guard = SelfCommitGuard::new(&vcs, SUMMARY, DEFAULT_SKIP_MARKER, "");
        let paths = vec![PathBuf::from("src/lib.rs"), PathBuf::from("Cargo.toml"), PathBuf::from("Cargo.toml")];

        let outcome = guard.finalize("main", &version("1.4.0"), &paths).await.unwrap();

        assert!(outcome.commit.is_some());
        assert_eq!(outcome.tag, "1.4.0");
        assert_eq!(
            log.entries(),
            vec![
                "vcs.stage src/lib.rs,Cargo.toml",
                "vcs.commit ci: format code, release 1.4.0, refresh docs [skip ci]",
                "vcs.push main",
                "vcs.tag 1.4.0",
                "vcs.push_tag 1.4.0",
            ]
        );
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[tokio::test]
    async fn test_nothing_to_commit_still_tags() {
        let log = CallLog::new();
        let vcs = MemoryVersionControl::new(log.clone());
        let mut guard = SelfCommitGuard::new(&vcs, SUMMARY, DEFAULT_SKIP_MARKER, "v");

        let outcome = guard.finalize("main", &version("1.4.0"), &[]).await.unwrap();

        assert_eq!(outcome.commit, None);
        assert_eq!(outcome.tag, "v1.4.0");
        assert!(!log.contains("vcs.commit"));
        assert!(!log.contains("vcs.push main"));
        assert_eq!(vcs.pushed_tags(), vec!["v1.4.0".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_push_fails_without_tag() {
        let log = CallLog::new();
        let vcs = MemoryVersionControl::new(log.clone());
        vcs.reject_pushes();
        let mut guard = SelfCommitGuard::new(&vcs, SUMMARY, DEFAULT_SKIP_MARKER, "");

        let err = guard
            .finalize("main", &version("1.4.0"), &[PathBuf::from("Cargo.toml")])
            .await
            .unwrap_err();

        assert!(matches!(err, ShiplineError::PushConflict { .. }));
        assert_eq!(err.exit_code(), 5);
        assert!(!log.contains("vcs.tag"));
        assert_eq!(log.entries().iter().filter(|c| c.starts_with("vcs.push")).count(), 1);
        assert_eq!(guard.state(), GuardState::Idle);
    }
}
