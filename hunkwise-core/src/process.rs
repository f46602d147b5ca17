//! Subprocess-backed diff and LLM producers.
//!
//! Both producers share one contract: run an argv vector in a working
//! directory and capture stdout as text. The LLM producer appends the prompt
//! as the final argument. Cancellation kills the child's whole process group,
//! so wrappers that fork (shell scripts, node launchers) do not leave their
//! workers running.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed { program: String, status: String, stderr: String },
    #[error("cancelled")]
    Cancelled,
}

/// Produces the raw unified diff of a working directory.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn diff(&self, dir: &Path, cancel: &CancellationToken) -> Result<String, ProcessError>;
}

/// Turns a prompt into free-form model output.
#[async_trait]
pub trait LlmSource: Send + Sync {
    async fn complete(
        &self,
        dir: &Path,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProcessError>;
}

/// A configured argv vector, usable as either producer.
#[derive(Debug, Clone)]
pub struct CommandSource {
    argv: Vec<String>,
}

impl CommandSource {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Runs the command in `dir`, optionally appending one extra argument,
    /// and returns its stdout.
    ///
    /// # Arguments
    ///
    /// * `dir` - working directory of the child.
    /// * `extra` - appended as the last argv element when present.
    /// * `cancel` - cancelling kills the child and yields [`ProcessError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Fails when the argv is empty, the program cannot be started, or it
    /// exits non-zero (the error carries the captured stderr).
    pub async fn run(
        &self,
        dir: &Path,
        extra: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, ProcessError> {
        let (program, args) = self.argv.split_first().ok_or(ProcessError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .args(extra)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: terminal signals go to the viewer, not the child,
        // and cancellation can reach every descendant through the group id.
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(program = %program, args = args.len(), dir = %dir.display(), "spawning");
        let child = cmd
            .spawn()
            .map_err(|source| ProcessError::Spawn { program: program.clone(), source })?;
        let pid = child.id();

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(program = %program, pid, "subprocess cancelled");
                kill_group(pid);
                return Err(ProcessError::Cancelled);
            }
            output = child.wait_with_output() => output
                .map_err(|source| ProcessError::Spawn { program: program.clone(), source })?,
        };

        if !output.status.success() {
            return Err(ProcessError::Failed {
                program: program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else { return };
    // Negative pid addresses the group; the child was spawned as its leader.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[async_trait]
impl DiffSource for CommandSource {
    async fn diff(&self, dir: &Path, cancel: &CancellationToken) -> Result<String, ProcessError> {
        self.run(dir, None, cancel).await
    }
}

#[async_trait]
impl LlmSource for CommandSource {
    async fn complete(
        &self,
        dir: &Path,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProcessError> {
        self.run(dir, Some(prompt), cancel).await
    }
}
