//! External command execution.

use std::fmt;
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};

use crate::error::{ConfdError, ConfdResult};

/// A command split into program and arguments.
///
/// Command strings are split on whitespace; quoting is not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(raw: &str) -> ConfdResult<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ConfdError::Config("Command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// The same command with one more trailing argument.
    pub fn with_arg(&self, arg: impl Into<String>) -> Self {
        let mut cmd = self.clone();
        cmd.args.push(arg.into());
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Command output for testability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Exit status as reported by the OS.
    pub status: String,
    /// Leading part of stderr written before the command exited.
    pub stderr: String,
}

impl CommandOutput {
    /// Status plus trimmed stderr, for error messages.
    pub fn describe(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.status.clone()
        } else {
            format!("{}: {}", self.status, stderr)
        }
    }
}

/// Trait for executing external commands (allows mocking in tests).
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion, failing with `TimedOut` after `timeout`.
    fn run(
        &self,
        cmd: &CommandLine,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<CommandOutput>> + Send;
}

/// Runs commands as child processes.
///
/// Completion is the exit of the direct child. Stdout is inherited; stderr is
/// captured up to [`STDERR_CAPTURE_LIMIT`] bytes, but only until shortly after
/// exit, since daemons started by a reload script keep the pipe open.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

/// Most stderr bytes kept per command.
pub const STDERR_CAPTURE_LIMIT: usize = 64 * 1024;

/// How long stderr is still drained after the child exited.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(100);

impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &CommandLine, timeout: Duration) -> io::Result<CommandOutput> {
        tracing::debug!(command = %cmd, "Executing command");

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let drain = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(drain_stderr(pipe, captured.clone())));

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status,
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(command = %cmd, error = %e, "Failed to kill timed out command");
                }
                if let Some(drain) = drain {
                    drain.abort();
                }
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} did not finish within {:?}", cmd.program, timeout),
                ));
            }
        };

        if let Some(mut drain) = drain {
            if tokio::time::timeout(STDERR_DRAIN_GRACE, &mut drain).await.is_err() {
                tracing::debug!(command = %cmd, "Stderr still open after exit, not waiting for it");
                drain.abort();
            }
        }
        let status = status?;
        let stderr = match captured.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).to_string(),
        };

        Ok(CommandOutput {
            success: status.success(),
            status: status.to_string(),
            stderr,
        })
    }
}

/// Read stderr until EOF, keeping at most [`STDERR_CAPTURE_LIMIT`] bytes.
async fn drain_stderr(mut pipe: ChildStderr, captured: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let Ok(mut buf) = captured.lock() else { break };
                let room = STDERR_CAPTURE_LIMIT.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}
