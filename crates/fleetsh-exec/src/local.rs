//! Local command execution using `tokio::process`

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::chunk::Utf8Chunker;
use crate::command::Command;
use crate::error::ExecError;
use crate::traits::RemoteExecutor;

const READ_BUFFER_SIZE: usize = 8192;

/// Local command executor
///
/// Executes commands on the local machine through `sh -c`. Stdout is
/// delivered to the command chunk by chunk as it is read.
#[derive(Debug, Clone)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, level = "debug")]
    async fn run(&self, command: &mut Command) -> Result<(), ExecError> {
        let start = Instant::now();
        let cmd = command.prepared_command();

        debug!(command = %cmd, "executing local command");

        // Use shell to support pipes, redirections, etc.
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::IoError("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::IoError("stderr not captured".to_string()))?;

        let stderr_read = async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        };

        let (streamed, stderr_bytes) = tokio::join!(stream_into(&mut stdout, command), stderr_read);
        streamed?;
        let stderr_bytes = stderr_bytes.map_err(|e| ExecError::IoError(e.to_string()))?;
        if !stderr_bytes.is_empty() {
            command.handle_stderr(String::from_utf8_lossy(&stderr_bytes).into_owned());
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        if let Some(code) = status.code() {
            command.handle_status(code);
        } else if let Some(sig) = status.signal() {
            command.handle_signal(signal_name(sig));
        }

        debug!(
            command = %cmd,
            status = ?command.exit_status(),
            signal = ?command.signal(),
            duration = ?start.elapsed(),
            "command completed"
        );

        if command.failure() {
            error!(
                command = %cmd,
                status = ?command.exit_status(),
                stderr = %command.stderr(),
                "command failed"
            );
        }

        Ok(())
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

async fn stream_into<R>(reader: &mut R, command: &mut Command) -> Result<(), ExecError>
where
    R: AsyncRead + Unpin,
{
    let mut chunker = Utf8Chunker::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        if n == 0 {
            break;
        }
        if let Some(text) = chunker.push(&buf[..n]) {
            command.handle_data(text);
        }
    }

    if let Some(text) = chunker.finish() {
        command.handle_data(text);
    }
    Ok(())
}

/// `SIGKILL`-style name for a raw signal number
pub(crate) fn signal_name(sig: i32) -> String {
    nix::sys::signal::Signal::try_from(sig)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{sig}"))
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    #[instrument(skip_all, level = "debug")]
    async fn execute(&self, command: &mut Command) -> Result<(), ExecError> {
        self.run(command).await
    }

    #[instrument(skip_all, level = "debug")]
    async fn execute_with_timeout(
        &self,
        command: &mut Command,
        timeout_duration: Duration,
    ) -> Result<(), ExecError> {
        let start = Instant::now();

        debug!(command = %command.raw_command(), timeout = ?timeout_duration, "executing with timeout");

        let result = timeout(timeout_duration, self.run(command)).await;

        match result {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %command.raw_command(),
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
