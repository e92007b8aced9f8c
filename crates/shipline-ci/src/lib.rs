//! Shipline CI - release pipeline orchestration
//!
//! Sequences the delegated tools of a release run:
//! - Validation (format, lint, test) on every non-skipped event
//! - Version resolution, packaging, upload and doc publication on release
//!   branches
//! - A marker-carrying self-commit and release tag
//!
//! Concrete collaborators run real processes (`CommandToolchain`,
//! `GitClient`) or talk HTTP (`HttpPackageIndex`).

pub mod commit_guard;
pub mod context;
pub mod git;
pub mod index;
pub mod pipeline;
pub mod release;
pub mod resolver;
pub mod runner;
pub mod stage;
pub mod toolchain;
pub mod validation;

// Re-export key types
pub use commit_guard::{commit_message, CommitOutcome, GuardState, SelfCommitGuard};
pub use context::RunContext;
pub use git::GitClient;
pub use index::HttpPackageIndex;
pub use pipeline::{evaluate_trigger, ReleasePipeline, TriggerDecision};
pub use release::{upload_idempotent, ReleaseExecutor, ReleaseOutput};
pub use resolver::{Resolution, VersionResolver};
pub use runner::CommandRunner;
pub use stage::{CommandSpec, ReleaseStep, ValidationStep};
pub use toolchain::CommandToolchain;
pub use validation::ValidationStage;
