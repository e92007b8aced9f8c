//! Shipline Core Library
//!
//! Domain model and pure decision logic of the release pipeline: the
//! trigger filter, the publish gate, version resolution, metadata editing,
//! configuration, and the collaborator traits the orchestration runs on.

pub mod artifact;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod event;
pub mod fakes;
pub mod metadata;
pub mod obs;
pub mod publish_gate;
pub mod report;
pub mod telemetry;
pub mod version;

pub use artifact::{artifact_name, ArtifactRef, DocArtifact, StepOutput};
pub use collaborators::{PackageIndex, Toolchain, VersionControl};
pub use config::{
    ArtifactConfig, CommandsConfig, GitConfig, LintConfig, RegistryConfig, RegistryCredentials,
    ShiplineConfig, VersionConfig, CONFIG_FILE,
};
pub use error::{Result, ShiplineError};
pub use event::{should_run, PipelineEvent, TriggerKind, DEFAULT_SKIP_MARKER};
pub use publish_gate::{
    evaluate_decision, evaluate_publish_gate, BlockReason, PublishVerdict, ReleaseDecision,
};
pub use report::{ReleaseSummary, RunOutcome, RunReport};
pub use telemetry::init_tracing;
pub use version::{
    latest_release_tag, next_version, tag_name, BumpLevel, ReleaseTag, VersionInputs,
    VersionStrategy, VersionString,
};

/// Shipline version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
