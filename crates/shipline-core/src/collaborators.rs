//! Collaborator trait definitions.
//!
//! Every delegated tool the pipeline sequences sits behind one of these
//! traits, with one method per capability:
//! - `Toolchain`: formatter, linter, test runner, doc generator, packager,
//!   doc-site publisher
//! - `PackageIndex`: the package index upload client
//! - `VersionControl`: the commit/tag/push client and history queries
//!
//! The orchestration code depends only on these traits. Process-backed
//! implementations live in `shipline-ci`; in-memory fakes for tests are in
//! the `fakes` module.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::artifact::{ArtifactRef, DocArtifact, StepOutput};
use crate::error::Result;
use crate::version::VersionString;

// ---------------------------------------------------------------------------
// Toolchain
// ---------------------------------------------------------------------------

/// Build tooling.
///
/// Validation methods return `Ok` with a non-zero exit code when the tool
/// ran and reported a failure; `Err` is reserved for the tool not running at
/// all. Release methods return `Err` for any failure.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Rewrite source files into canonical format, in place.
    async fn format(&self) -> Result<StepOutput>;

    /// Run the doc/style linter over the configured rule subset.
    async fn lint(&self) -> Result<StepOutput>;

    /// Run the test suite, documentation examples included.
    async fn test(&self) -> Result<StepOutput>;

    /// Generate documentation for the release.
    async fn generate_docs(&self, version: &VersionString) -> Result<DocArtifact>;

    /// Package the project into an archive named `{project}-{version}`.
    async fn package(&self, project: &str, version: &VersionString) -> Result<ArtifactRef>;

    /// Publish generated documentation to the hosting target.
    async fn publish_docs(&self, docs: &DocArtifact, target: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// PackageIndex
// ---------------------------------------------------------------------------

/// Package index, addressed by artifact name + version.
///
/// Published artifacts are append-only.
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Whether an artifact with this name and version is already published.
    async fn contains(&self, artifact: &ArtifactRef) -> Result<bool>;

    /// Upload the artifact.
    ///
    /// Returns `false` when the index reports it already holds this name and
    /// version, which happens when another run published between the
    /// `contains` probe and the upload.
    async fn upload(&self, artifact: &ArtifactRef) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// VersionControl
// ---------------------------------------------------------------------------

/// Version-control client for the working copy the pipeline runs in.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// All tag names in the repository.
    async fn tags(&self) -> Result<Vec<String>>;

    /// Full messages of commits reachable from HEAD but not from `since`
    /// (all of history when `since` is `None`), newest first.
    async fn commit_messages_since(&self, since: Option<&str>) -> Result<Vec<String>>;

    /// Tracked paths with uncommitted modifications, as absolute paths.
    async fn changed_files(&self) -> Result<Vec<PathBuf>>;

    /// Stage exactly these paths.
    async fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Whether the index differs from HEAD.
    async fn has_staged_changes(&self) -> Result<bool>;

    /// Commit the staged changes; returns the new commit id.
    async fn commit(&self, message: &str) -> Result<String>;

    /// Push HEAD to `branch` on the remote.
    ///
    /// A rejected push is `ShiplineError::PushConflict`; never forced.
    async fn push(&self, branch: &str) -> Result<()>;

    /// Create an annotated tag at HEAD.
    async fn create_tag(&self, name: &str, message: &str) -> Result<()>;

    /// Push a single tag to the remote.
    async fn push_tag(&self, name: &str) -> Result<()>;
}
