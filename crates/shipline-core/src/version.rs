//! Version resolution.
//!
//! The next version is a pure function of repository state: the release
//! tags, the commit messages since the newest one, the version currently in
//! the metadata file and the configured [`VersionStrategy`]. Every bump
//! strictly advances the version, so successive release runs are monotonic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{Result, ShiplineError};

/// A resolved semantic version, computed once per run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionString(semver::Version);

impl VersionString {
    pub fn new(version: semver::Version) -> Self {
        Self(version)
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }

}

impl std::str::FromStr for VersionString {
    type Err = ShiplineError;

    fn from_str(s: &str) -> Result<Self> {
        semver::Version::parse(s.trim())
            .map(VersionString)
            .map_err(|e| ShiplineError::VersionResolution(format!("'{s}' is not valid semver: {e}")))
    }
}

impl TryFrom<String> for VersionString {
    type Error = ShiplineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<VersionString> for String {
    fn from(v: VersionString) -> Self {
        v.to_string()
    }
}

impl std::fmt::Display for VersionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How far to advance the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    Patch,
    Minor,
    Major,
}

impl BumpLevel {
    /// Apply the bump. A pre-release baseline is promoted to its release
    /// version, which already orders above it.
    pub fn apply(&self, current: &semver::Version) -> semver::Version {
        if !current.pre.is_empty() {
            return semver::Version::new(current.major, current.minor, current.patch);
        }
        match self {
            BumpLevel::Major => semver::Version::new(current.major + 1, 0, 0),
            BumpLevel::Minor => semver::Version::new(current.major, current.minor + 1, 0),
            BumpLevel::Patch => {
                semver::Version::new(current.major, current.minor, current.patch + 1)
            }
        }
    }
}

/// Bump policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// Derive the bump from conventional-commit headers.
    #[default]
    Conventional,
    /// Always bump the patch component.
    Patch,
}

/// Conventional commit type, as far as it matters for bumping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Breaking,
    Feature,
    Other,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^(?P<type>[A-Za-z]+)(?:\([^)]*\))?(?P<bang>!)?:\s")
            .expect("conventional commit header regex is valid")
    })
}

/// Classify a commit message by its conventional-commit header and footers.
pub fn classify_commit(message: &str) -> CommitKind {
    let header = message.lines().next().unwrap_or("").trim();
    let breaking_footer = message
        .lines()
        .skip(1)
        .any(|l| l.starts_with("BREAKING CHANGE:") || l.starts_with("BREAKING-CHANGE:"));

    match header_regex().captures(header) {
        Some(caps) => {
            if caps.name("bang").is_some() || breaking_footer {
                CommitKind::Breaking
            } else if caps["type"].eq_ignore_ascii_case("feat") {
                CommitKind::Feature
            } else {
                CommitKind::Other
            }
        }
        None if breaking_footer => CommitKind::Breaking,
        None => CommitKind::Other,
    }
}

/// Bump level implied by a set of commit messages under `strategy`.
///
/// Never less than [`BumpLevel::Patch`]. On a `0.x` baseline a breaking
/// change bumps the minor component.
pub fn bump_level<S: AsRef<str>>(
    strategy: VersionStrategy,
    baseline: &semver::Version,
    commits: &[S],
) -> BumpLevel {
    if strategy == VersionStrategy::Patch {
        return BumpLevel::Patch;
    }

    let level = commits
        .iter()
        .map(|c| match classify_commit(c.as_ref()) {
            CommitKind::Breaking => BumpLevel::Major,
            CommitKind::Feature => BumpLevel::Minor,
            CommitKind::Other => BumpLevel::Patch,
        })
        .max()
        .unwrap_or(BumpLevel::Patch);

    if level == BumpLevel::Major && baseline.major == 0 {
        BumpLevel::Minor
    } else {
        level
    }
}

/// A release tag and the version it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
    pub name: String,
    pub version: semver::Version,
}

/// Format the tag name for a version.
pub fn tag_name(prefix: &str, version: &VersionString) -> String {
    format!("{prefix}{version}")
}

/// Find the newest release tag.
///
/// A tag is a release tag when it starts with `prefix` followed by a digit.
/// Such a tag that does not parse as semver makes the history ambiguous and
/// is a resolution failure; unrelated tags are ignored.
pub fn latest_release_tag<S: AsRef<str>>(tags: &[S], prefix: &str) -> Result<Option<ReleaseTag>> {
    let mut latest: Option<ReleaseTag> = None;

    for tag in tags {
        let name = tag.as_ref().trim();
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let version = semver::Version::parse(rest).map_err(|e| {
            ShiplineError::VersionResolution(format!(
                "tag '{name}' looks like a release tag but is not valid semver: {e}"
            ))
        })?;
        if latest.as_ref().map_or(true, |l| version > l.version) {
            latest = Some(ReleaseTag {
                name: name.to_string(),
                version,
            });
        }
    }

    Ok(latest)
}

/// Inputs to [`next_version`], gathered from the repository.
#[derive(Debug, Clone)]
pub struct VersionInputs<'a> {
    pub latest_tag: Option<&'a ReleaseTag>,
    pub commits_since_tag: &'a [String],
    pub metadata_version: Option<&'a semver::Version>,
    pub strategy: VersionStrategy,
    pub initial: Option<&'a str>,
}

/// Compute the next release version.
///
/// - With a release tag: a metadata version above the tag is an operator
///   chosen version and is released as-is; otherwise the tag version is
///   bumped per strategy.
/// - Without any release tag: the metadata version is the first release;
///   `initial` applies only when the metadata holds no version. With
///   neither, the history is missing and resolution fails.
pub fn next_version(inputs: &VersionInputs<'_>) -> Result<VersionString> {
    match inputs.latest_tag {
        Some(tag) => {
            if let Some(meta) = inputs.metadata_version {
                if *meta > tag.version {
                    return Ok(VersionString(meta.clone()));
                }
            }
            let level = bump_level(inputs.strategy, &tag.version, inputs.commits_since_tag);
            Ok(VersionString(level.apply(&tag.version)))
        }
        None => match (inputs.metadata_version, inputs.initial) {
            (Some(meta), _) => Ok(VersionString(meta.clone())),
            (None, Some(initial)) => initial.parse(),
            (None, None) => Err(ShiplineError::VersionResolution(
                "no release tags, no metadata version and no initial version configured"
                    .to_string(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> semver::Version {
        semver::Version::parse(s).unwrap()
    }

    fn tag(name: &str, version: &str) -> ReleaseTag {
        ReleaseTag {
            name: name.to_string(),
            version: v(version),
        }
    }

    #[test]
    fn test_bump_apply() {
        assert_eq!(BumpLevel::Major.apply(&v("1.2.3")), v("2.0.0"));
        assert_eq!(BumpLevel::Minor.apply(&v("1.2.3")), v("1.3.0"));
        assert_eq!(BumpLevel::Patch.apply(&v("1.2.3")), v("1.2.4"));
    }

    #[test]
    fn test_prerelease_promotes_to_release() {
        assert_eq!(BumpLevel::Patch.apply(&v("1.4.0-rc.1")), v("1.4.0"));
        assert_eq!(BumpLevel::Major.apply(&v("2.0.0-beta")), v("2.0.0"));
        assert!(v("1.4.0") > v("1.4.0-rc.1"));
    }

    #[test]
    fn test_classify_commit() {
        assert_eq!(classify_commit("feat: add upload"), CommitKind::Feature);
        assert_eq!(classify_commit("feat(index): add upload"), CommitKind::Feature);
        assert_eq!(classify_commit("fix!: drop old flag"), CommitKind::Breaking);
        assert_eq!(
            classify_commit("refactor: rework\n\nBREAKING CHANGE: config moved"),
            CommitKind::Breaking
        );
        assert_eq!(classify_commit("fix: typo"), CommitKind::Other);
        assert_eq!(classify_commit("update readme"), CommitKind::Other);
        assert_eq!(classify_commit(""), CommitKind::Other);
    }

    #[test]
    fn test_bump_level_conventional() {
        let base = v("1.3.2");
        let commits = vec!["fix: a".to_string(), "feat: b".to_string()];
        assert_eq!(
            bump_level(VersionStrategy::Conventional, &base, &commits),
            BumpLevel::Minor
        );
        let none: Vec<String> = vec![];
        assert_eq!(
            bump_level(VersionStrategy::Conventional, &base, &none),
            BumpLevel::Patch
        );
        let breaking = vec!["feat!: new api".to_string()];
        assert_eq!(
            bump_level(VersionStrategy::Conventional, &base, &breaking),
            BumpLevel::Major
        );
        assert_eq!(
            bump_level(VersionStrategy::Patch, &base, &breaking),
            BumpLevel::Patch
        );
    }

    #[test]
    fn test_breaking_on_zero_major_bumps_minor() {
        let breaking = vec!["feat!: new api".to_string()];
        assert_eq!(
            bump_level(VersionStrategy::Conventional, &v("0.4.1"), &breaking),
            BumpLevel::Minor
        );
    }

    #[test]
    fn test_latest_release_tag_picks_highest_semver() {
        let tags = vec!["1.2.0", "1.10.0", "1.9.3", "nightly", "docs-v2"];
        let latest = latest_release_tag(&tags, "").unwrap().unwrap();
        assert_eq!(latest.name, "1.10.0");
        assert_eq!(latest.version, v("1.10.0"));
    }

    #[test]
    fn test_latest_release_tag_with_prefix() {
        let tags = vec!["v0.9.0", "v1.0.0", "1.5.0"];
        let latest = latest_release_tag(&tags, "v").unwrap().unwrap();
        assert_eq!(latest.name, "v1.0.0");
    }

    #[test]
    fn test_malformed_release_tag_is_fatal() {
        let tags = vec!["1.2.0", "1.3"];
        let err = latest_release_tag(&tags, "").unwrap_err();
        assert!(matches!(err, ShiplineError::VersionResolution(_)));
    }

    #[test]
    fn test_no_tags_is_none() {
        let tags: Vec<String> = vec![];
        assert!(latest_release_tag(&tags, "").unwrap().is_none());
    }

    #[test]
    fn test_next_version_bumps_latest_tag() {
        let latest = tag("1.3.7", "1.3.7");
        let commits = vec!["feat: thing".to_string()];
        let meta = v("1.3.7");
        let next = next_version(&VersionInputs {
            latest_tag: Some(&latest),
            commits_since_tag: &commits,
            metadata_version: Some(&meta),
            strategy: VersionStrategy::Conventional,
            initial: None,
        })
        .unwrap();
        assert_eq!(next.to_string(), "1.4.0");
    }

    #[test]
    fn test_next_version_honours_manual_metadata_bump() {
        let latest = tag("1.3.7", "1.3.7");
        let meta = v("2.0.0");
        let next = next_version(&VersionInputs {
            latest_tag: Some(&latest),
            commits_since_tag: &[],
            metadata_version: Some(&meta),
            strategy: VersionStrategy::Conventional,
            initial: None,
        })
        .unwrap();
        assert_eq!(next.to_string(), "2.0.0");
    }

    #[test]
    fn test_next_version_ignores_stale_metadata() {
        let latest = tag("1.3.7", "1.3.7");
        let meta = v("1.0.0");
        let next = next_version(&VersionInputs {
            latest_tag: Some(&latest),
            commits_since_tag: &[],
            metadata_version: Some(&meta),
            strategy: VersionStrategy::Patch,
            initial: None,
        })
        .unwrap();
        assert_eq!(next.to_string(), "1.3.8");
    }

    #[test]
    fn test_missing_history_without_initial_fails() {
        let err = next_version(&VersionInputs {
            latest_tag: None,
            commits_since_tag: &[],
            metadata_version: None,
            strategy: VersionStrategy::Conventional,
            initial: None,
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_first_release_uses_initial() {
        let next = next_version(&VersionInputs {
            latest_tag: None,
            commits_since_tag: &[],
            metadata_version: None,
            strategy: VersionStrategy::Conventional,
            initial: Some("0.1.0"),
        })
        .unwrap();
        assert_eq!(next.to_string(), "0.1.0");
    }

    #[test]
    fn test_first_release_keeps_metadata_version() {
        let meta = v("1.3.7");
        let next = next_version(&VersionInputs {
            latest_tag: None,
            commits_since_tag: &[],
            metadata_version: Some(&meta),
            strategy: VersionStrategy::Conventional,
            initial: Some("0.1.0"),
        })
        .unwrap();
        assert_eq!(next.to_string(), "1.3.7");
    }

    #[test]
    fn test_first_release_from_metadata_without_initial() {
        let meta = v("2.1.0");
        let next = next_version(&VersionInputs {
            latest_tag: None,
            commits_since_tag: &["feat: x".to_string()],
            metadata_version: Some(&meta),
            strategy: VersionStrategy::Conventional,
            initial: None,
        })
        .unwrap();
        assert_eq!(next.to_string(), "2.1.0");
    }

    #[test]
    fn test_successive_resolutions_are_monotonic() {
        let mut current = tag("0.1.0", "0.1.0");
        let histories: Vec<Vec<String>> = vec![
            vec!["fix: a".into()],
            vec!["feat: b".into()],
            vec![],
            vec!["feat!: c".into()],
            vec!["chore: d".into()],
        ];
        for commits in histories {
            let next = next_version(&VersionInputs {
                latest_tag: Some(&current),
                commits_since_tag: &commits,
                metadata_version: None,
                strategy: VersionStrategy::Conventional,
                initial: None,
            })
            .unwrap();
            assert!(next.as_semver() > &current.version);
            current = tag(&next.to_string(), &next.to_string());
        }
    }

    #[test]
    fn test_version_string_serde_as_string() {
        let version: VersionString = "1.4.0".parse().unwrap();
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"1.4.0\"");
        let back: VersionString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
        assert!(serde_json::from_str::<VersionString>("\"1.4\"").is_err());
    }
}
