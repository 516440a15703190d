// ABOUTME: External process gateway behind a CommandRunner seam
// ABOUTME: Runs a fixed argument vector with a deadline and returns combined output and exit status

use crate::error::{Result, SandboxError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr
    pub output: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn new(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            output: output.into(),
            exit_code: Some(exit_code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes argument vectors against the host.
///
/// `args[0]` is the program. Implementations must honour `timeout` and report
/// it as [`SandboxError::Timeout`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Real runner spawning child processes with tokio
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| SandboxError::Wrong("Empty command".to_string()))?;

        debug!("Running {:?}", args);

        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::NotFound(format!("Failed to spawn {}: {}", program, e)))?;

        // Dropping the wait future on timeout kills the child
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SandboxError::Unknown(format!(
                    "Failed to wait for {}: {}",
                    program, e
                )))
            }
            Err(_) => {
                warn!("{:?} exceeded deadline of {:?}", args, timeout);
                return Err(SandboxError::Timeout(format!(
                    "{} did not finish within {}s",
                    args.join(" "),
                    timeout.as_secs()
                )));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            output: combined,
            exit_code: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_command_is_wrong() {
        let result = ProcessRunner::new().run(&[], Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SandboxError::Wrong(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let result = ProcessRunner::new()
            .run(
                &argv(&["crowbox-definitely-not-a-binary"]),
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(result, Err(SandboxError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_combines_stdout_and_stderr() {
        let output = ProcessRunner::new()
            .run(
                &argv(&["sh", "-c", "echo out; echo err 1>&2; exit 3"]),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(output.output, "out\nerr\n");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_is_enforced() {
        let result = ProcessRunner::new()
            .run(&argv(&["sleep", "5"]), Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(SandboxError::Timeout(_))));
    }
}
