//! Shipline - release automation for a single package
//!
//! The `shipline` command runs inside a CI job on every repository event.
//!
//! ## Commands
//!
//! - `run`: the full pipeline (validate, gate, version, release, self-commit)
//! - `check-trigger`: print the trigger filter and publish gate decisions
//! - `next-version`: print the version the next release would get
//!
//! Exit codes: 0 on success and on every gate skip, 2 validation failure,
//! 3 version resolution failure, 4 release failure, 5 rejected push,
//! 1 anything else.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

use shipline_ci::{
    evaluate_trigger, CommandToolchain, GitClient, HttpPackageIndex, ReleasePipeline,
    VersionResolver,
};
use shipline_core::{PipelineEvent, RunOutcome, RunReport, ShiplineConfig, ShiplineError, TriggerKind};

#[derive(Parser)]
#[command(name = "shipline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Format, validate, version, package and publish on every push", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: shipline.toml in the working directory)
    #[arg(long, global = true, env = "SHIPLINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the release pipeline for one repository event
    Run {
        #[command(flatten)]
        event: EventArgs,

        /// Repository working directory
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print whether an event would run, and whether it would release
    CheckTrigger {
        #[command(flatten)]
        event: EventArgs,

        /// Repository working directory (for config discovery)
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },

    /// Print the next release version without writing anything
    NextVersion {
        /// Repository working directory
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },
}

/// Where the pipeline event comes from. `--event-file` wins over the
/// individual flags.
#[derive(Args)]
struct EventArgs {
    /// Trigger kind: push or merge-request
    #[arg(long = "event", env = "SHIPLINE_EVENT", default_value = "push")]
    trigger: String,

    /// Pushed branch, or the target branch of a merge request
    #[arg(long, env = "SHIPLINE_BRANCH")]
    branch: Option<String>,

    /// Message of the head commit
    #[arg(long, env = "SHIPLINE_COMMIT_MESSAGE")]
    message: Option<String>,

    /// JSON event file ({"trigger_kind", "branch", "head_commit_message"})
    #[arg(long)]
    event_file: Option<PathBuf>,
}

impl EventArgs {
    fn resolve(&self) -> Result<PipelineEvent> {
        if let Some(path) = &self.event_file {
            return PipelineEvent::from_json_file(path)
                .with_context(|| format!("Failed to read event file {}", path.display()));
        }
        let trigger: TriggerKind = self.trigger.parse()?;
        let Some(branch) = self.branch.clone().filter(|b| !b.trim().is_empty()) else {
            bail!("no branch given (use --branch or SHIPLINE_BRANCH)");
        };
        Ok(PipelineEvent::new(trigger, branch, self.message.clone()))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipline_core::init_tracing(cli.json, level);

    let config_path = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Run {
            event,
            workdir,
            report,
        } => cmd_run(config_path, event, workdir, report.as_deref()).await,
        Commands::CheckTrigger { event, workdir } => cmd_check_trigger(config_path, event, workdir),
        Commands::NextVersion { workdir } => cmd_next_version(config_path, workdir).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Map an error to the documented exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ShiplineError>()
        .map(|e| e.exit_code())
        .unwrap_or(1)
        .clamp(1, 255) as u8
}

fn load_config(explicit: Option<&Path>, workdir: &Path) -> Result<ShiplineConfig> {
    let config = match explicit {
        Some(path) => ShiplineConfig::load(path),
        None => ShiplineConfig::discover(workdir),
    };
    config.context("Failed to load configuration")
}

fn canonical_workdir(workdir: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(workdir)
        .with_context(|| format!("Working directory {} is not accessible", workdir.display()))
}

async fn cmd_run(
    config_path: Option<&Path>,
    event: &EventArgs,
    workdir: &Path,
    report_path: Option<&Path>,
) -> Result<u8> {
    let workdir = canonical_workdir(workdir)?;
    let config = load_config(config_path, &workdir)?;
    let event = event.resolve()?;

    let vcs = GitClient::open(&workdir, &config.git)
        .await
        .context("Failed to open repository")?;
    let index = HttpPackageIndex::new(config.registry.clone())?;
    let toolchain = CommandToolchain::new(&workdir, &config);

    info!(project = %config.project_name, workdir = %workdir.display(), "starting pipeline");
    let pipeline = ReleasePipeline::new(
        config,
        &workdir,
        Arc::new(toolchain),
        Arc::new(index),
        Arc::new(vcs),
    );
    let report = pipeline.run(&event).await;

    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    print_outcome(&report);

    Ok(report.outcome.exit_code().clamp(0, 255) as u8)
}

fn print_outcome(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Skipped { reason } => println!("skipped: {reason}"),
        RunOutcome::Validated { blocked_by } => {
            println!("validated; release skipped: {blocked_by}")
        }
        RunOutcome::Released(summary) => {
            println!("released {} (tag {})", summary.artifact.name, summary.tag);
            if summary.upload_skipped {
                println!("  upload skipped: already at the package index");
            }
            if let Some(digest) = &summary.artifact_sha256 {
                println!("  sha256 {digest}");
            }
            match &summary.commit {
                Some(commit) => println!("  commit {commit}"),
                None => println!("  nothing to commit"),
            }
        }
        RunOutcome::Failed { error, .. } => eprintln!("failed: {error}"),
    }
    for step in &report.steps {
        let status = if step.passed() { "ok" } else { "FAILED" };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status, step.step, step.duration_ms, step.exit_code
        );
    }
}

fn cmd_check_trigger(config_path: Option<&Path>, event: &EventArgs, workdir: &Path) -> Result<u8> {
    let config = load_config(config_path, workdir)?;
    let event = event.resolve()?;
    let decision = evaluate_trigger(&config, &event);

    let output = serde_json::json!({
        "event": event,
        "run": decision.run,
        "release": decision.gate.passed,
        "blocked_by": decision.gate.blocked_by,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

async fn cmd_next_version(config_path: Option<&Path>, workdir: &Path) -> Result<u8> {
    let workdir = canonical_workdir(workdir)?;
    let config = load_config(config_path, &workdir)?;
    let vcs = GitClient::open(&workdir, &config.git)
        .await
        .context("Failed to open repository")?;

    let resolver = VersionResolver::new(
        &config,
        &vcs,
        workdir.join(&config.version.metadata_file),
    );
    let resolution = resolver.compute().await?;

    match &resolution.previous {
        Some(tag) => info!(previous = %tag.name, commits = resolution.commits, "resolved"),
        None => info!("no previous release tag"),
    }
    println!("{}", resolution.version);
    Ok(0)
}
