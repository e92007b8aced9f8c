//! Version resolver: gathers repository state, computes the next version
//! and persists it into the metadata file.

use shipline_core::metadata::{read_version, write_version};
use shipline_core::obs;
use shipline_core::{
    latest_release_tag, next_version, tag_name, ReleaseTag, Result, ShiplineConfig,
    ShiplineError, VersionControl, VersionInputs, VersionString,
};
use std::path::{Path, PathBuf};

/// A computed release version and the state it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub version: VersionString,
    pub previous: Option<ReleaseTag>,
    /// Commits considered since the previous release tag.
    pub commits: usize,
}

pub struct VersionResolver<'a> {
    config: &'a ShiplineConfig,
    vcs: &'a dyn VersionControl,
    metadata_file: PathBuf,
}

impl<'a> VersionResolver<'a> {
    /// `metadata_file` is the resolved path of `version.metadata_file`.
    pub fn new(config: &'a ShiplineConfig, vcs: &'a dyn VersionControl, metadata_file: PathBuf) -> Self {
        Self {
            config,
            vcs,
            metadata_file,
        }
    }

    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Compute the next version without touching the metadata file.
    pub async fn compute(&self) -> Result<Resolution> {
        let tags = self.vcs.tags().await?;
        let previous = latest_release_tag(&tags, &self.config.tag_prefix)?;
        let commits = self
            .vcs
            .commit_messages_since(previous.as_ref().map(|t| t.name.as_str()))
            .await?;

        let metadata_version = if self.metadata_file.exists() {
            read_version(&self.metadata_file, &self.config.version.key)?
        } else {
            None
        };

        let version = next_version(&VersionInputs {
            latest_tag: previous.as_ref(),
            commits_since_tag: &commits,
            metadata_version: metadata_version.as_ref(),
            strategy: self.config.version.strategy,
            initial: self.config.version.initial.as_deref(),
        })?;

        if let Some(prev) = &previous {
            if version.as_semver() <= &prev.version {
                return Err(ShiplineError::VersionResolution(format!(
                    "resolved {version} does not advance past {}",
                    prev.name
                )));
            }
        }
        let tag = tag_name(&self.config.tag_prefix, &version);
        if tags.iter().any(|t| *t == tag) {
            return Err(ShiplineError::VersionResolution(format!(
                "version {version} is already tagged"
            )));
        }

        Ok(Resolution {
            version,
            previous,
            commits: commits.len(),
        })
    }

    /// Compute the next version and write it into the metadata file.
    ///
    /// Any failure along the way is a version resolution failure.
    pub async fn apply(&self) -> Result<Resolution> {
        let resolution = self.compute().await.map_err(into_resolution_error)?;
        write_version(&self.metadata_file, &self.config.version.key, &resolution.version)
            .map_err(into_resolution_error)?;

        obs::emit_version_resolved(
            &resolution.version.to_string(),
            resolution.previous.as_ref().map(|t| t.name.as_str()),
            resolution.commits,
        );
        Ok(resolution)
    }
}

fn into_resolution_error(err: ShiplineError) -> ShiplineError {
    match err {
        ShiplineError::VersionResolution(_) => err,
        other => ShiplineError::VersionResolution(other.to_string()),
    }
}
