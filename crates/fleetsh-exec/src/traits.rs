//! Executor contract

use std::time::Duration;

use async_trait::async_trait;

use crate::command::Command;
use crate::error::ExecError;

/// A single-host transport that drives a [`Command`]
///
/// Implementations send [`Command::prepared_command`] to the host and report
/// back through the command's callbacks: at most one
/// [`handle_status`](Command::handle_status), zero or more
/// [`handle_data`](Command::handle_data) calls in the order the bytes were
/// produced, and at most one [`handle_signal`](Command::handle_signal).
///
/// When an error is returned the command keeps whatever was recorded up to
/// that point, which may be nothing at all.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run the command to completion
    async fn execute(&self, command: &mut Command) -> Result<(), ExecError>;

    /// Run the command, giving up after `timeout`
    async fn execute_with_timeout(
        &self,
        command: &mut Command,
        timeout: Duration,
    ) -> Result<(), ExecError>;

    /// Whether a session is currently open
    fn is_connected(&self) -> bool {
        true
    }

    /// Short transport name for logging
    fn executor_type(&self) -> &'static str;

    /// Close the session, if any
    async fn disconnect(&self) -> Result<(), ExecError> {
        Ok(())
    }
}
