//! Delegated tool execution.

use shipline_core::{Result, ShiplineError, StepOutput};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::stage::CommandSpec;

/// Exit code reported for a command killed by its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Runs one command as an awaited child process and captures its output.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute `spec` in `workdir`.
    ///
    /// A command that runs and exits non-zero is `Ok` with that exit code;
    /// `Err` means it could not be started. A fired timeout kills the child
    /// and is reported as a failed step.
    pub async fn execute(spec: &CommandSpec, workdir: &Path) -> Result<StepOutput> {
        let start = Instant::now();

        let Some((exe, args)) = spec.command.split_first() else {
            return Err(ShiplineError::Command(format!(
                "step {} has an empty command",
                spec.name
            )));
        };

        tracing::debug!(step = %spec.name, command = ?spec.command, "spawning");

        let child = Command::new(exe)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShiplineError::Command(format!("cannot run {exe}: {e}")))?;

        let output = if spec.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            {
                Ok(output) => output?,
                Err(_) => {
                    return Ok(StepOutput {
                        step: spec.name.clone(),
                        exit_code: TIMEOUT_EXIT_CODE,
                        stdout: String::new(),
                        stderr: format!(
                            "{} timed out after {} seconds",
                            spec.name, spec.timeout_secs
                        ),
                        duration_ms: start.elapsed().as_millis() as u64,
                    });
                }
            }
        } else {
            child.wait_with_output().await?
        };

        Ok(StepOutput {
            step: spec.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
