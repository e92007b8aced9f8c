//! Release executor: docs, package, upload, doc-site publication.
//!
//! Sub-steps run strictly in order and the first failure halts the rest.
//! An uploaded artifact is never rolled back.

use sha2::{Digest, Sha256};
use shipline_core::obs;
use shipline_core::{ArtifactRef, PackageIndex, Result, ShiplineError, Toolchain};
use std::path::Path;

use crate::context::RunContext;
use crate::stage::ReleaseStep;

/// What the executor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutput {
    pub artifact: ArtifactRef,
    pub artifact_sha256: Option<String>,
    /// The index already held this name+version.
    pub upload_skipped: bool,
}

pub struct ReleaseExecutor<'a> {
    toolchain: &'a dyn Toolchain,
    index: &'a dyn PackageIndex,
    project: &'a str,
    docs_target: &'a str,
    workdir: &'a Path,
}

impl<'a> ReleaseExecutor<'a> {
    pub fn new(
        toolchain: &'a dyn Toolchain,
        index: &'a dyn PackageIndex,
        project: &'a str,
        docs_target: &'a str,
        workdir: &'a Path,
    ) -> Self {
        Self {
            toolchain,
            index,
            project,
            docs_target,
            workdir,
        }
    }

    /// Release the version held in `ctx`. Fails with a version resolution
    /// error before any side effect if the resolver has not run.
    pub async fn execute(&self, ctx: &mut RunContext) -> Result<ReleaseOutput> {
        let version = ctx.resolved_version()?;
        let docs = ctx
            .track(ReleaseStep::Docs.name(), self.toolchain.generate_docs(&version))
            .await
            .map_err(|e| ShiplineError::release(ReleaseStep::Docs.name(), e))?;

        let artifact = ctx
            .track(ReleaseStep::Package.name(), self.toolchain.package(self.project, &version))
            .await
            .map_err(|e| ShiplineError::release(ReleaseStep::Package.name(), e))?;
        let artifact_sha256 = self.digest(&artifact).await;

        let uploaded = ctx
            .track(ReleaseStep::Upload.name(), upload_idempotent(self.index, &artifact))
            .await
            .map_err(|e| ShiplineError::release(ReleaseStep::Upload.name(), e))?;

        ctx.track(
            ReleaseStep::PublishDocs.name(),
            self.toolchain.publish_docs(&docs, self.docs_target),
        )
        .await
        .map_err(|e| ShiplineError::release(ReleaseStep::PublishDocs.name(), e))?;

        Ok(ReleaseOutput {
            artifact,
            artifact_sha256,
            upload_skipped: !uploaded,
        })
    }

    /// SHA-256 of the archive; `None` when it cannot be read.
    async fn digest(&self, artifact: &ArtifactRef) -> Option<String> {
        let path = self.workdir.join(&artifact.path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot hash artifact");
                None
            }
        }
    }
}

/// Upload unless the index already has this name+version.
///
/// Returns whether this run published the artifact. An existing artifact,
/// found by the probe or reported by the upload itself, is not an error.
pub async fn upload_idempotent(index: &dyn PackageIndex, artifact: &ArtifactRef) -> Result<bool> {
    if index.contains(artifact).await? || !index.upload(artifact).await? {
        obs::emit_upload_skipped(&artifact.name);
        return Ok(false);
    }
    Ok(true)
}
