//! Static pipeline configuration (`shipline.toml`).
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration once `project_name` is set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShiplineError};
use crate::event::DEFAULT_SKIP_MARKER;
use crate::version::VersionStrategy;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "shipline.toml";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShiplineConfig {
    /// Package name; artifacts are named `{project_name}-{version}`.
    pub project_name: String,

    /// Branches eligible for the release path.
    pub release_branches: BTreeSet<String>,

    /// Where generated documentation is published.
    pub doc_hosting_target: String,

    /// Commit-message sentinel shared by the trigger filter and the
    /// self-commit guard.
    pub skip_marker: String,

    /// Summary line of the self-commit; `{version}` is substituted.
    pub commit_summary: String,

    /// Prefix of release tag names (`""` gives `1.4.0`, `"v"` gives `v1.4.0`).
    pub tag_prefix: String,

    pub version: VersionConfig,
    pub registry: RegistryConfig,
    pub commands: CommandsConfig,
    pub lint: LintConfig,
    pub artifact: ArtifactConfig,
    pub git: GitConfig,
}

impl Default for ShiplineConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            release_branches: ["main", "master"].iter().map(|s| s.to_string()).collect(),
            doc_hosting_target: "gh-pages".to_string(),
            skip_marker: DEFAULT_SKIP_MARKER.to_string(),
            commit_summary: "ci: format code, release {version}, refresh docs".to_string(),
            tag_prefix: String::new(),
            version: VersionConfig::default(),
            registry: RegistryConfig::default(),
            commands: CommandsConfig::default(),
            lint: LintConfig::default(),
            artifact: ArtifactConfig::default(),
            git: GitConfig::default(),
        }
    }
}

impl ShiplineConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ShiplineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `shipline.toml` from `workdir` if present, defaults otherwise.
    pub fn discover(workdir: &Path) -> Result<Self> {
        let path = workdir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ShiplineError::Config(e.to_string()))
    }

    /// Reject configurations the pipeline cannot run safely with.
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(ShiplineError::Config("project_name must be set".to_string()));
        }
        if self.release_branches.is_empty() {
            return Err(ShiplineError::Config(
                "release_branches must name at least one branch".to_string(),
            ));
        }
        // An empty marker would let the self-commit re-trigger the pipeline.
        if self.skip_marker.trim().is_empty() {
            return Err(ShiplineError::Config("skip_marker must not be empty".to_string()));
        }
        if self.git.remote.trim().is_empty() {
            return Err(ShiplineError::Config("git.remote must not be empty".to_string()));
        }
        if self.version.key.trim().is_empty() {
            return Err(ShiplineError::Config("version.key must not be empty".to_string()));
        }
        if let Some(initial) = &self.version.initial {
            semver::Version::parse(initial).map_err(|e| {
                ShiplineError::Config(format!("version.initial '{initial}' is not semver: {e}"))
            })?;
        }
        for (name, argv) in self.commands.named() {
            if argv.is_empty() {
                return Err(ShiplineError::Config(format!("commands.{name} is empty")));
            }
        }
        Ok(())
    }
}

/// Version resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionConfig {
    /// Metadata file holding the version, relative to the working directory.
    pub metadata_file: PathBuf,

    /// Dotted key of the version inside the metadata file.
    pub key: String,

    pub strategy: VersionStrategy,

    /// Version of the first release, used only when no release tag exists.
    pub initial: Option<String>,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            metadata_file: PathBuf::from("Cargo.toml"),
            key: "package.version".to_string(),
            strategy: VersionStrategy::Conventional,
            initial: None,
        }
    }
}

/// Package index endpoints and credential sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// URL answering 2xx when `{name}`/`{version}` is already published.
    pub exists_url: String,

    /// URL the artifact is `PUT` to.
    pub upload_url: String,

    pub username_env: String,
    pub password_env: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            exists_url: String::new(),
            upload_url: String::new(),
            username_env: "SHIPLINE_REGISTRY_USERNAME".to_string(),
            password_env: "SHIPLINE_REGISTRY_PASSWORD".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Read the credentials from the configured environment variables.
    pub fn credentials(&self) -> Result<RegistryCredentials> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ShiplineError::Config(format!("environment variable {var} is not set")))
        };
        Ok(RegistryCredentials {
            username: read(&self.username_env)?,
            password: read(&self.password_env)?,
        })
    }
}

/// Opaque upload credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Argv templates of the delegated tools.
///
/// Placeholders are substituted per argument: `{project}`, `{version}`,
/// `{name}`, `{artifact}`, `{docs_dir}`, `{target}`. An argument that is
/// exactly `{rules}` or `{exclude}` expands to flag/value pairs from
/// [`LintConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
    pub format: Vec<String>,
    pub lint: Vec<String>,
    pub test: Vec<String>,
    pub docs: Vec<String>,
    pub package: Vec<String>,
    pub publish_docs: Vec<String>,

    /// Per-command timeout; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            format: strings(&["cargo", "fmt", "--all"]),
            lint: strings(&["cargo", "clippy", "--workspace", "{exclude}", "--", "{rules}"]),
            test: strings(&["cargo", "test", "--workspace"]),
            docs: strings(&["cargo", "doc", "--no-deps"]),
            package: strings(&[
                "tar",
                "-czf",
                "{artifact}",
                "--exclude=./dist",
                "--exclude=./target",
                "--exclude=./.git",
                ".",
            ]),
            publish_docs: strings(&["rsync", "-a", "--delete", "{docs_dir}/", "{target}"]),
            timeout_secs: 0,
        }
    }
}

impl CommandsConfig {
    /// Every command with its config name.
    pub fn named(&self) -> [(&'static str, &Vec<String>); 6] {
        [
            ("format", &self.format),
            ("lint", &self.lint),
            ("test", &self.test),
            ("docs", &self.docs),
            ("package", &self.package),
            ("publish_docs", &self.publish_docs),
        ]
    }
}

/// Lint restriction: which rules are enforced and which paths are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    pub rules: Vec<String>,
    pub rule_flag: String,
    pub exclude: Vec<String>,
    pub exclude_flag: String,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            rules: strings(&["missing_docs"]),
            rule_flag: "-D".to_string(),
            exclude: Vec::new(),
            exclude_flag: "--exclude".to_string(),
        }
    }
}

/// Where artifacts land on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactConfig {
    /// Archive path template, relative to the working directory.
    pub path: String,

    /// Directory the doc generator writes to.
    pub docs_dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: "dist/{project}-{version}.tar.gz".to_string(),
            docs_dir: PathBuf::from("target/doc"),
        }
    }
}

/// Identity and remote used for the self-commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    pub remote: String,

    /// Committer identity; the repository's own config is used when unset.
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            user_name: None,
            user_email: None,
        }
    }
}
