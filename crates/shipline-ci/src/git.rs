//! [`VersionControl`] backed by the system `git` binary.

use async_trait::async_trait;
use shipline_core::{GitConfig, Result, ShiplineError, VersionControl};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Separator placed after each message by `git log --format=%B%x1e`.
const RECORD_SEPARATOR: char = '\x1e';

/// Git client rooted at a work tree.
#[derive(Debug, Clone)]
pub struct GitClient {
    root: PathBuf,
    remote: String,
    user_name: Option<String>,
    user_email: Option<String>,
}

impl GitClient {
    /// Open the work tree containing `dir`.
    pub async fn open(dir: &Path, config: &GitConfig) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ShiplineError::Git(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(ShiplineError::Git(format!(
                "{} is not inside a git work tree: {}",
                dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            root: PathBuf::from(root),
            remote: config.remote.clone(),
            user_name: config.user_name.clone(),
            user_email: config.user_email.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn raw(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        if let Some(name) = &self.user_name {
            cmd.arg("-c").arg(format!("user.name={name}"));
        }
        if let Some(email) = &self.user_email {
            cmd.arg("-c").arg(format!("user.email={email}"));
        }
        tracing::debug!(args = ?args, "git");
        cmd.args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ShiplineError::Git(format!("failed to run git: {e}")))
    }

    /// Run git and return stdout, failing on a non-zero exit.
    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = self.raw(args).await?;
        if !output.status.success() {
            return Err(ShiplineError::Git(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Push `refspec`; a rejection by the remote is a push conflict.
    async fn push_ref(&self, refspec: &str, target: &str) -> Result<()> {
        let output = self.raw(&["push", self.remote.as_str(), refspec]).await?;
        if output.status.success() {
            return Ok(());
        }
        let detail = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
        .trim()
        .to_string();
        if is_rejection(&detail) {
            Err(ShiplineError::PushConflict {
                branch: target.to_string(),
                detail,
            })
        } else {
            Err(ShiplineError::Git(format!("git push {refspec} failed: {detail}")))
        }
    }
}

/// Whether push output describes the remote refusing the update, as opposed
/// to a transport or auth failure.
pub fn is_rejection(output: &str) -> bool {
    ["[rejected]", "non-fast-forward", "fetch first", "stale info", "already exists"]
        .iter()
        .any(|needle| output.contains(needle))
}

/// Parse `git status --porcelain -z` into paths relative to the root.
fn parse_porcelain(raw: &str) -> Vec<&str> {
    let mut paths = Vec::new();
    let mut entries = raw.split('\0').filter(|e| !e.is_empty());
    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let (status, path) = entry.split_at(3);
        paths.push(path);
        // Renames and copies are followed by their source path.
        if status.contains('R') || status.contains('C') {
            entries.next();
        }
    }
    paths
}

#[async_trait]
impl VersionControl for GitClient {
    async fn tags(&self) -> Result<Vec<String>> {
        let out = self.git(&["tag", "--list"]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn commit_messages_since(&self, since: Option<&str>) -> Result<Vec<String>> {
        let range = match since {
            Some(tag) => format!("{tag}..HEAD"),
            None => "HEAD".to_string(),
        };
        let out = self.git(&["log", "--format=%B%x1e", range.as_str()]).await?;
        Ok(out
            .split(RECORD_SEPARATOR)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect())
    }

    async fn changed_files(&self) -> Result<Vec<PathBuf>> {
        let out = self
            .git(&["status", "--porcelain", "-z", "--untracked-files=no"])
            .await?;
        Ok(parse_porcelain(&out)
            .into_iter()
            .map(|p| self.root.join(p))
            .collect())
    }

    async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["add", "--"];
        args.extend(listed.iter().map(String::as_str));
        self.git(&args).await.map(|_| ())
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        let output = self.raw(&["diff", "--cached", "--quiet"]).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ShiplineError::Git(format!(
                "git diff --cached failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn commit(&self, message: &str) -> Result<String> {
        self.git(&["commit", "--no-verify", "-m", message]).await?;
        let sha = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(sha.trim().to_string())
    }

    async fn push(&self, branch: &str) -> Result<()> {
        self.push_ref(&format!("HEAD:refs/heads/{branch}"), branch).await
    }

    async fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        self.git(&["tag", "-a", name, "-m", message]).await.map(|_| ())
    }

    async fn push_tag(&self, name: &str) -> Result<()> {
        self.push_ref(&format!("refs/tags/{name}"), name).await
    }
}
