//! Executor construction from host configuration

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetsh_exec::{Command, ExecError, LocalExecutor, RemoteExecutor, SshExecutor};

use crate::config::HostConfig;

/// Builds the executor a configured host runs its commands through
pub trait ExecutorFactory: Send + Sync {
    /// Create an executor for `host`
    ///
    /// # Errors
    /// Returns error if the host's transport cannot be set up
    fn create_executor(&self, host: &HostConfig) -> Result<Arc<dyn RemoteExecutor>, ExecError>;
}

/// Local execution for `localhost`, SSH for everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExecutorFactory;

impl ExecutorFactory for DefaultExecutorFactory {
    fn create_executor(&self, host: &HostConfig) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        if host.is_local() {
            Ok(Arc::new(LocalExecutor::new()))
        } else {
            Ok(Arc::new(SshExecutor::new(host.connection_info())?))
        }
    }
}

/// Stands in for an executor that could not be built
///
/// Every command fails with the construction error and records no exit
/// status.
#[derive(Debug, Clone)]
pub struct UnavailableExecutor {
    error: ExecError,
}

impl UnavailableExecutor {
    #[must_use]
    pub fn new(error: ExecError) -> Self {
        Self { error }
    }

    #[must_use]
    pub fn error(&self) -> &ExecError {
        &self.error
    }
}

#[async_trait]
impl RemoteExecutor for UnavailableExecutor {
    async fn execute(&self, _command: &mut Command) -> Result<(), ExecError> {
        Err(self.error.clone())
    }

    async fn execute_with_timeout(
        &self,
        command: &mut Command,
        _timeout: Duration,
    ) -> Result<(), ExecError> {
        self.execute(command).await
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn executor_type(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_runs_locally() {
        let executor = DefaultExecutorFactory
            .create_executor(&HostConfig::new("localhost"))
            .unwrap();
        assert_eq!(executor.executor_type(), "local");
    }

    #[test]
    fn test_remote_needs_credentials() {
        let result = DefaultExecutorFactory.create_executor(&HostConfig::new("10.0.0.1"));
        assert!(matches!(result, Err(ExecError::ConfigError(_))));
    }

    #[test]
    fn test_remote_with_password_is_ssh() {
        let mut host = HostConfig::new("10.0.0.1");
        host.password = Some("secret".to_string());

        let executor = DefaultExecutorFactory.create_executor(&host).unwrap();
        assert_eq!(executor.executor_type(), "ssh");
    }

    #[tokio::test]
    async fn test_unavailable_returns_stored_error() {
        let executor = UnavailableExecutor::new(ExecError::SshKeyError("missing".to_string()));
        let mut cmd = Command::new("uptime");

        let err = executor.execute(&mut cmd).await.unwrap_err();

        assert_eq!(err, ExecError::SshKeyError("missing".to_string()));
        assert_eq!(cmd.exit_status(), None);
        assert!(!executor.is_connected());
    }
}
