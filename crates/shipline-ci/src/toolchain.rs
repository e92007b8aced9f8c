//! Process-backed [`Toolchain`]: every capability is a configured argv
//! template run through [`CommandRunner`].

use async_trait::async_trait;
use shipline_core::{
    artifact_name, ArtifactConfig, ArtifactRef, CommandsConfig, DocArtifact, LintConfig, Result,
    ShiplineConfig, ShiplineError, StepOutput, Toolchain, VersionString,
};
use std::path::PathBuf;

use crate::runner::CommandRunner;
use crate::stage::{expand_argv, substitute, CommandSpec, ReleaseStep, ValidationStep};

pub struct CommandToolchain {
    workdir: PathBuf,
    project: String,
    commands: CommandsConfig,
    lint: LintConfig,
    artifact: ArtifactConfig,
}

impl CommandToolchain {
    pub fn new(workdir: impl Into<PathBuf>, config: &ShiplineConfig) -> Self {
        Self {
            workdir: workdir.into(),
            project: config.project_name.clone(),
            commands: config.commands.clone(),
            lint: config.lint.clone(),
            artifact: config.artifact.clone(),
        }
    }

    /// Expand the template for `name` with `vars`.
    pub fn command_spec(&self, name: &str, template: &[String], vars: &[(&str, &str)]) -> CommandSpec {
        CommandSpec::new(
            name,
            expand_argv(template, vars, &self.lint),
            self.commands.timeout_secs,
        )
    }

    async fn run(&self, name: &str, template: &[String], vars: &[(&str, &str)]) -> Result<StepOutput> {
        let spec = self.command_spec(name, template, vars);
        CommandRunner::execute(&spec, &self.workdir).await
    }

    /// Run a release command; any non-zero exit is an error carrying the
    /// tool's diagnostic.
    async fn run_checked(&self, name: &str, template: &[String], vars: &[(&str, &str)]) -> Result<()> {
        let output = self.run(name, template, vars).await?;
        if output.passed() {
            Ok(())
        } else {
            Err(ShiplineError::Command(output.diagnostic()))
        }
    }

    async fn validation(&self, step: ValidationStep, template: &[String]) -> Result<StepOutput> {
        self.run(step.name(), template, &[("project", self.project.as_str())]).await
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn format(&self) -> Result<StepOutput> {
        self.validation(ValidationStep::Format, &self.commands.format).await
    }

    async fn lint(&self) -> Result<StepOutput> {
        self.validation(ValidationStep::Lint, &self.commands.lint).await
    }

    async fn test(&self) -> Result<StepOutput> {
        self.validation(ValidationStep::Test, &self.commands.test).await
    }

    async fn generate_docs(&self, version: &VersionString) -> Result<DocArtifact> {
        let version = version.to_string();
        let docs_dir = self.artifact.docs_dir.display().to_string();
        self.run_checked(
            ReleaseStep::Docs.name(),
            &self.commands.docs,
            &[
                ("project", self.project.as_str()),
                ("version", version.as_str()),
                ("docs_dir", docs_dir.as_str()),
            ],
        )
        .await?;

        let path = self.workdir.join(&self.artifact.docs_dir);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ShiplineError::Command(format!(
                "doc generator produced nothing at {}",
                path.display()
            )));
        }
        Ok(DocArtifact { path })
    }

    async fn package(&self, project: &str, version: &VersionString) -> Result<ArtifactRef> {
        let version_str = version.to_string();
        let name = artifact_name(project, version);
        let relative = substitute(
            &self.artifact.path,
            &[("project", project), ("version", version_str.as_str()), ("name", name.as_str())],
        );
        let path = self.workdir.join(relative.as_str());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.run_checked(
            ReleaseStep::Package.name(),
            &self.commands.package,
            &[
                ("project", project),
                ("version", version_str.as_str()),
                ("name", name.as_str()),
                ("artifact", relative.as_str()),
            ],
        )
        .await?;

        if !tokio::fs::try_exists(&path).await? {
            return Err(ShiplineError::Command(format!(
                "packager did not produce {}",
                path.display()
            )));
        }
        Ok(ArtifactRef::new(project, version, path))
    }

    async fn publish_docs(&self, docs: &DocArtifact, target: &str) -> Result<()> {
        let docs_dir = docs.path.display().to_string();
        self.run_checked(
            ReleaseStep::PublishDocs.name(),
            &self.commands.publish_docs,
            &[
                ("project", self.project.as_str()),
                ("docs_dir", docs_dir.as_str()),
                ("target", target),
            ],
        )
        .await
    }
}
