use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::error::ProcessError;

/// One invocation of an external program
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub stdin: Option<String>,
}

/// Captured result of a finished invocation
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Non-zero exit, or -1 when the process was killed by a signal
    Error(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Error(code) => *code,
        }
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands with `tokio::process`
pub struct TokioProcessRunner;

fn spawn(command: &ProcessCommand) -> Result<tokio::process::Child, ProcessError> {
    use std::process::Stdio;

    let mut cmd = tokio::process::Command::new(&command.program);
    cmd.args(&command.args)
        .envs(&command.env)
        .stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ProcessError::CommandNotFound(command.program.clone()),
        _ => ProcessError::Io(e),
    })
}

async fn feed_prompt(child: &mut tokio::process::Child, input: &str) -> Result<(), ProcessError> {
    use tokio::io::AsyncWriteExt;

    let Some(mut pipe) = child.stdin.take() else {
        return Ok(());
    };
    pipe.write_all(input.as_bytes()).await?;
    // Dropping the pipe sends EOF; the CLI reads the whole prompt first
    pipe.shutdown().await?;
    Ok(())
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!("Spawning {} with {} argument(s)", command.program, command.args.len());
        let started = Instant::now();

        let mut child = spawn(&command)?;
        if let Some(input) = &command.stdin {
            feed_prompt(&mut child, input).await?;
        }

        // kill_on_drop reaps the child when the timeout drops the future
        let output = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ProcessError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        let status = match output.status.code() {
            Some(0) => ExitStatus::Success,
            Some(code) => ExitStatus::Error(code),
            None => ExitStatus::Error(-1),
        };
        tracing::trace!("{} finished with {:?} in {:?}", command.program, status, started.elapsed());

        Ok(ProcessOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::subprocess::ProcessCommandBuilder;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let output = TokioProcessRunner
            .run(ProcessCommandBuilder::new("sh").args(["-c", "echo hi; exit 3"]).build())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hi");
        assert_eq!(output.status, ExitStatus::Error(3));
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let output = TokioProcessRunner
            .run(
                ProcessCommandBuilder::new("cat")
                    .stdin("from stdin".to_string())
                    .build(),
            )
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "from stdin");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = TokioProcessRunner
            .run(ProcessCommandBuilder::new("definitely-not-a-real-binary-xyz").build())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::CommandNotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = TokioProcessRunner
            .run(
                ProcessCommandBuilder::new("sleep")
                    .args(["5"])
                    .timeout(Duration::from_millis(50))
                    .build(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout(_)));
    }
}
