//! External command execution
//!
//! Runs runtime CLI commands as child processes, polling for completion
//! with a fixed timeout, plus a passthrough mode for interactive commands.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Commands still running after this long are killed and reported as failed
pub const COMMAND_TIMEOUT_SECS: u64 = 20;
/// Interval between exit-status polls
const POLL_INTERVAL_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Command `{command}` timed out after {timeout_secs}s and was killed")]
    TimedOut { command: String, timeout_secs: u64 },
    #[error("Command `{command}` exited with status {code}")]
    NonZeroExit { command: String, code: i32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run a command to completion with the default 20-second timeout
pub async fn run_checked(program: &str, args: &[String]) -> Result<(), ExecError> {
    run_with_timeout(program, args, Duration::from_secs(COMMAND_TIMEOUT_SECS)).await
}

/// Run a command, polling its exit status at 1-second intervals
///
/// The child is killed and the call fails if it is still running when the
/// timeout elapses. Output is captured and forwarded to the log.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<(), ExecError> {
    let command = display_command(program, args);
    debug!(command = %command, timeout_secs = timeout.as_secs(), "Running command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        let cmd = command.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(command = %cmd, stream = "stdout", line = %line, "Command output");
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let cmd = command.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(command = %cmd, stream = "stderr", line = %line, "Command stderr");
            }
        });
    }

    let mut elapsed = Duration::ZERO;
    loop {
        if let Some(status) = child.try_wait()? {
            return if status.success() {
                debug!(command = %command, "Command completed");
                Ok(())
            } else {
                Err(ExecError::NonZeroExit {
                    command,
                    code: status.code().unwrap_or(-1),
                })
            };
        }

        if elapsed >= timeout {
            warn!(command = %command, "Command timed out, killing");
            child.kill().await?;
            return Err(ExecError::TimedOut {
                command,
                timeout_secs: timeout.as_secs(),
            });
        }

        let interval = Duration::from_millis(POLL_INTERVAL_MS).min(timeout - elapsed);
        sleep(interval).await;
        elapsed += interval;
    }
}

/// Run a command with inherited stdio and no timeout
///
/// Used for interactive and streaming commands (`run`, `logs --follow`)
/// where output must reach the user's terminal directly.
pub async fn run_passthrough(program: &str, args: &[String]) -> Result<(), ExecError> {
    let command = display_command(program, args);
    debug!(command = %command, "Running passthrough command");

    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        Err(ExecError::NonZeroExit {
            command,
            code: status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_successful_command() {
        let result = run_with_timeout("true", &[], Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let result = run_with_timeout("false", &[], Duration::from_secs(5)).await;
        match result {
            Err(ExecError::NonZeroExit { code, .. }) => assert_eq!(code, 1),
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let result = run_with_timeout("sleep", &args(&["30"]), Duration::from_millis(200)).await;
        match result {
            Err(ExecError::TimedOut { .. }) => {}
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let result =
            run_with_timeout("apds-no-such-binary", &[], Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_passthrough_non_zero_exit() {
        let result = run_passthrough("false", &[]).await;
        assert!(matches!(result, Err(ExecError::NonZeroExit { .. })));
    }

    #[test]
    fn test_display_command() {
        assert_eq!(display_command("docker", &[]), "docker");
        assert_eq!(
            display_command("docker", &args(&["ps", "-a"])),
            "docker ps -a"
        );
    }
}
