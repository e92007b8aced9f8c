//! Error taxonomy for the release pipeline.
//!
//! A gate skip is not an error and never appears here; it is reported as a
//! pipeline outcome instead.

/// Shipline errors.
#[derive(Debug, thiserror::Error)]
pub enum ShiplineError {
    #[error("validation step '{step}' failed:\n{diagnostic}")]
    Validation { step: String, diagnostic: String },

    #[error("version resolution failed: {0}")]
    VersionResolution(String),

    #[error("release step '{step}' failed: {message}")]
    Release { step: String, message: String },

    #[error("push to '{branch}' was rejected: {detail}")]
    PushConflict { branch: String, detail: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("metadata file error: {0}")]
    Metadata(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("package index error: {0}")]
    Index(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShiplineError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShiplineError::Validation { .. } => 2,
            ShiplineError::VersionResolution(_) => 3,
            ShiplineError::Release { .. } => 4,
            ShiplineError::PushConflict { .. } => 5,
            _ => 1,
        }
    }

    /// Wrap any error raised inside a release sub-step.
    pub fn release(step: &str, err: impl std::fmt::Display) -> Self {
        ShiplineError::Release {
            step: step.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for Shipline operations.
pub type Result<T> = std::result::Result<T, ShiplineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_surfaces_diagnostic() {
        let err = ShiplineError::Validation {
            step: "test".to_string(),
            diagnostic: "assertion failed: left == right".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'test'"));
        assert!(msg.contains("assertion failed"));
    }

    #[test]
    fn test_exit_codes_follow_taxonomy() {
        let validation = ShiplineError::Validation {
            step: "lint".to_string(),
            diagnostic: String::new(),
        };
        assert_eq!(validation.exit_code(), 2);
        assert_eq!(
            ShiplineError::VersionResolution("no tags".to_string()).exit_code(),
            3
        );
        assert_eq!(ShiplineError::release("upload", "503").exit_code(), 4);
        let conflict = ShiplineError::PushConflict {
            branch: "main".to_string(),
            detail: "non-fast-forward".to_string(),
        };
        assert_eq!(conflict.exit_code(), 5);
        assert_eq!(ShiplineError::Config("bad".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_release_helper_keeps_step_name() {
        let err = ShiplineError::release("package", "tar exited with 2");
        assert!(err.to_string().contains("'package'"));
        assert!(err.to_string().contains("tar exited with 2"));
    }
}
