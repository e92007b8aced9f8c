//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `FakeToolchain`, `MemoryPackageIndex`, and `MemoryVersionControl`.
//! All three can share one [`CallLog`] so tests can assert the exact order
//! of side effects across collaborators, or that there were none at all.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::artifact::{artifact_name, ArtifactRef, DocArtifact, StepOutput};
use crate::collaborators::*;
use crate::error::{Result, ShiplineError};
use crate::version::VersionString;

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// Ordered record of collaborator calls, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().unwrap().is_empty()
    }

    /// Whether any recorded call starts with `prefix`.
    pub fn contains(&self, prefix: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.starts_with(prefix))
    }

    /// Position of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .position(|c| c.starts_with(prefix))
    }
}

// ---------------------------------------------------------------------------
// FakeToolchain
// ---------------------------------------------------------------------------

/// Toolchain whose steps succeed unless told to fail.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    log: CallLog,
    failing: Mutex<HashSet<String>>,
}

impl FakeToolchain {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make `step` fail (`format`, `lint`, `test`, `docs`, `package`,
    /// `publish_docs`).
    pub fn fail_step(&self, step: &str) {
        self.failing.lock().unwrap().insert(step.to_string());
    }

    fn fails(&self, step: &str) -> bool {
        self.failing.lock().unwrap().contains(step)
    }

    fn validation_step(&self, step: &str) -> StepOutput {
        self.log.record(format!("toolchain.{step}"));
        if self.fails(step) {
            StepOutput::failed(step, 1, format!("{step} failed (fake)"))
        } else {
            StepOutput::ok(step)
        }
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn format(&self) -> Result<StepOutput> {
        Ok(self.validation_step("format"))
    }

    async fn lint(&self) -> Result<StepOutput> {
        Ok(self.validation_step("lint"))
    }

    async fn test(&self) -> Result<StepOutput> {
        Ok(self.validation_step("test"))
    }

    async fn generate_docs(&self, version: &VersionString) -> Result<DocArtifact> {
        self.log.record(format!("toolchain.docs {version}"));
        if self.fails("docs") {
            return Err(ShiplineError::Command("doc generator failed (fake)".to_string()));
        }
        Ok(DocArtifact {
            path: PathBuf::from("target/doc"),
        })
    }

    async fn package(&self, project: &str, version: &VersionString) -> Result<ArtifactRef> {
        self.log.record(format!("toolchain.package {project} {version}"));
        if self.fails("package") {
            return Err(ShiplineError::Command("packager failed (fake)".to_string()));
        }
        let path = PathBuf::from(format!("dist/{}.tar.gz", artifact_name(project, version)));
        Ok(ArtifactRef::new(project, version, path))
    }

    async fn publish_docs(&self, docs: &DocArtifact, target: &str) -> Result<()> {
        self.log
            .record(format!("toolchain.publish_docs {} {target}", docs.path.display()));
        if self.fails("publish_docs") {
            return Err(ShiplineError::Command("doc publish failed (fake)".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryPackageIndex
// ---------------------------------------------------------------------------

/// In-memory package index keyed by `(name, version)`.
#[derive(Debug, Default)]
pub struct MemoryPackageIndex {
    log: CallLog,
    published: Mutex<BTreeSet<(String, String)>>,
    uploads: Mutex<u64>,
    fail_uploads: Mutex<bool>,
    hidden_from_probe: Mutex<bool>,
}

impl MemoryPackageIndex {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Pre-populate an artifact, as if a previous run had uploaded it.
    pub fn seed(&self, name: &str, version: &str) {
        self.published
            .lock()
            .unwrap()
            .insert((name.to_string(), version.to_string()));
    }

    /// Make `contains` always answer `false`, as a stale listing would.
    pub fn hide_from_probe(&self) {
        *self.hidden_from_probe.lock().unwrap() = true;
    }

    pub fn fail_uploads(&self) {
        *self.fail_uploads.lock().unwrap() = true;
    }

    /// Number of artifacts stored at the index.
    pub fn artifact_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Number of upload calls that reached the index.
    pub fn upload_count(&self) -> u64 {
        *self.uploads.lock().unwrap()
    }
}

#[async_trait]
impl PackageIndex for MemoryPackageIndex {
    async fn contains(&self, artifact: &ArtifactRef) -> Result<bool> {
        if *self.hidden_from_probe.lock().unwrap() {
            return Ok(false);
        }
        let published = self.published.lock().unwrap();
        Ok(published.contains(&(artifact.name.clone(), artifact.version.to_string())))
    }

    async fn upload(&self, artifact: &ArtifactRef) -> Result<bool> {
        self.log.record(format!("index.upload {}", artifact.name));
        if *self.fail_uploads.lock().unwrap() {
            return Err(ShiplineError::Index("index unavailable (fake)".to_string()));
        }
        *self.uploads.lock().unwrap() += 1;
        let mut published = self.published.lock().unwrap();
        let key = (artifact.name.clone(), artifact.version.to_string());
        Ok(published.insert(key))
    }
}

// ---------------------------------------------------------------------------
// MemoryVersionControl
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct VcsState {
    tags: Vec<String>,
    history: Vec<String>,
    dirty: Vec<PathBuf>,
    staged: Vec<PathBuf>,
    commits: Vec<String>,
    pushed: Vec<String>,
    pushed_tags: Vec<String>,
    reject_push: bool,
}

/// In-memory repository: tags, commit messages and a working tree.
#[derive(Debug, Default)]
pub struct MemoryVersionControl {
    log: CallLog,
    state: Mutex<VcsState>,
}

impl MemoryVersionControl {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            state: Mutex::new(VcsState::default()),
        }
    }

    pub fn with_tags(self, tags: &[&str]) -> Self {
        self.state.lock().unwrap().tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Commit messages since the newest tag, newest first.
    pub fn with_history(self, messages: &[&str]) -> Self {
        self.state.lock().unwrap().history = messages.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Files the working tree reports as modified.
    pub fn with_dirty(self, paths: &[&str]) -> Self {
        self.state.lock().unwrap().dirty = paths.iter().map(PathBuf::from).collect();
        self
    }

    /// Reject every push, like a remote that moved underneath us.
    pub fn reject_pushes(&self) {
        self.state.lock().unwrap().reject_push = true;
    }

    pub fn commits(&self) -> Vec<String> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn staged(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().staged.clone()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state.lock().unwrap().tags.clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.state.lock().unwrap().pushed.clone()
    }

    pub fn pushed_tags(&self) -> Vec<String> {
        self.state.lock().unwrap().pushed_tags.clone()
    }
}

#[async_trait]
impl VersionControl for MemoryVersionControl {
    async fn tags(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().tags.clone())
    }

    async fn commit_messages_since(&self, _since: Option<&str>) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().history.clone())
    }

    async fn changed_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.state.lock().unwrap().dirty.clone())
    }

    async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.log.record(format!("vcs.stage {}", listed.join(",")));
        let mut state = self.state.lock().unwrap();
        for path in paths {
            if !state.staged.contains(path) {
                state.staged.push(path.clone());
            }
        }
        Ok(())
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        Ok(!self.state.lock().unwrap().staged.is_empty())
    }

    async fn commit(&self, message: &str) -> Result<String> {
        self.log.record(format!("vcs.commit {message}"));
        let mut state = self.state.lock().unwrap();
        if state.staged.is_empty() {
            return Err(ShiplineError::Git("nothing to commit".to_string()));
        }
        state.staged.clear();
        state.dirty.clear();
        state.commits.push(message.to_string());
        Ok(format!("{:040x}", state.commits.len()))
    }

    async fn push(&self, branch: &str) -> Result<()> {
        self.log.record(format!("vcs.push {branch}"));
        let mut state = self.state.lock().unwrap();
        if state.reject_push {
            return Err(ShiplineError::PushConflict {
                branch: branch.to_string(),
                detail: "! [rejected] (fetch first)".to_string(),
            });
        }
        state.pushed.push(branch.to_string());
        Ok(())
    }

    async fn create_tag(&self, name: &str, _message: &str) -> Result<()> {
        self.log.record(format!("vcs.tag {name}"));
        let mut state = self.state.lock().unwrap();
        if state.tags.iter().any(|t| t == name) {
            return Err(ShiplineError::Git(format!("tag '{name}' already exists")));
        }
        state.tags.push(name.to_string());
        Ok(())
    }

    async fn push_tag(&self, name: &str) -> Result<()> {
        self.log.record(format!("vcs.push_tag {name}"));
        self.state.lock().unwrap().pushed_tags.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(s: &str) -> VersionString {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn memory_index_is_append_only() {
        let index = MemoryPackageIndex::new(CallLog::new());
        let artifact = ArtifactRef::new("proj", &version("1.0.0"), PathBuf::from("dist/x"));
        assert!(!index.contains(&artifact).await.unwrap());
        assert!(index.upload(&artifact).await.unwrap());
        assert!(index.contains(&artifact).await.unwrap());
        assert!(!index.upload(&artifact).await.unwrap(), "existing artifact is kept");
        assert_eq!(index.artifact_count(), 1);
        assert_eq!(index.upload_count(), 2);
    }

    #[tokio::test]
    async fn memory_vcs_commit_requires_staged_changes() {
        let vcs = MemoryVersionControl::new(CallLog::new());
        assert!(vcs.commit("empty").await.is_err());
        vcs.stage(&[PathBuf::from("Cargo.toml")]).await.unwrap();
        assert!(vcs.has_staged_changes().await.unwrap());
        vcs.commit("release").await.unwrap();
        assert!(!vcs.has_staged_changes().await.unwrap());
        assert_eq!(vcs.commits(), vec!["release".to_string()]);
    }

    #[tokio::test]
    async fn call_log_is_shared_and_ordered() {
        let log = CallLog::new();
        let toolchain = FakeToolchain::new(log.clone());
        let vcs = MemoryVersionControl::new(log.clone());
        toolchain.format().await.unwrap();
        vcs.push("main").await.unwrap();
        assert_eq!(
            log.entries(),
            vec!["toolchain.format".to_string(), "vcs.push main".to_string()]
        );
        assert!(log.position("toolchain.format") < log.position("vcs.push"));
    }

    #[tokio::test]
    async fn fake_toolchain_failure_is_reported_as_exit_code() {
        let toolchain = FakeToolchain::new(CallLog::new());
        toolchain.fail_step("test");
        let out = toolchain.test().await.unwrap();
        assert!(!out.passed());
        assert!(out.diagnostic().contains("test failed"));
    }
}
