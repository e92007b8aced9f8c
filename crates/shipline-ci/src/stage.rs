//! Pipeline step names and delegated command definitions.

use serde::{Deserialize, Serialize};
use shipline_core::LintConfig;

/// Validation sub-steps, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStep {
    /// Rewrite sources into canonical format, in place.
    Format,

    /// Doc/style lint over the configured rule subset.
    Lint,

    /// Test suite, documentation examples included.
    Test,
}

impl ValidationStep {
    pub const ORDER: [ValidationStep; 3] =
        [ValidationStep::Format, ValidationStep::Lint, ValidationStep::Test];

    pub fn name(&self) -> &'static str {
        match self {
            ValidationStep::Format => "format",
            ValidationStep::Lint => "lint",
            ValidationStep::Test => "test",
        }
    }
}

/// Release sub-steps, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStep {
    Docs,
    Package,
    Upload,
    PublishDocs,
}

impl ReleaseStep {
    pub fn name(&self) -> &'static str {
        match self {
            ReleaseStep::Docs => "docs",
            ReleaseStep::Package => "package",
            ReleaseStep::Upload => "upload",
            ReleaseStep::PublishDocs => "publish_docs",
        }
    }
}

/// A fully expanded command, ready to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Step name, used in logs and the run report.
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Timeout in seconds; 0 waits indefinitely.
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
        }
    }
}

/// Replace every `{key}` in `template` with its value.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// Expand an argv template.
///
/// An argument that is exactly `{rules}` or `{exclude}` becomes one
/// flag/value pair per configured lint rule or excluded path (nothing when
/// the list is empty). Every other argument goes through [`substitute`].
pub fn expand_argv(template: &[String], vars: &[(&str, &str)], lint: &LintConfig) -> Vec<String> {
    fn pairs(argv: &mut Vec<String>, flag: &str, values: &[String]) {
        for value in values {
            if !flag.is_empty() {
                argv.push(flag.to_string());
            }
            argv.push(value.clone());
        }
    }

    let mut argv = Vec::with_capacity(template.len());
    for arg in template {
        match arg.as_str() {
            "{rules}" => pairs(&mut argv, &lint.rule_flag, &lint.rules),
            "{exclude}" => pairs(&mut argv, &lint.exclude_flag, &lint.exclude),
            _ => argv.push(substitute(arg, vars)),
        }
    }
    argv
}
