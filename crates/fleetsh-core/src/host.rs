//! Single-host operations
//!
//! A [`Host`] binds one executor to a name and an optional elevation
//! context, and exposes the typed operations built on top of it.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fleetsh_exec::{Command, ExecError, RemoteExecutor};
use fleetsh_parse::{
    EnvParser, HostnameParser, ProcessInfo, PsOptions, PsParser, Uptime, UptimeParser,
    UserSession, WhoParser, env, hostname, uptime, who,
};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::error::HostError;
use crate::registry::{ParserRegistry, Structured};
use crate::result::CommandResult;

/// Who, where and with which environment shell operations run
///
/// Elevation applies only when both `user` and `shell` are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellContext {
    pub user: Option<String>,
    pub shell: Option<String>,
    pub path: Option<String>,
    pub env: Option<String>,
}

impl ShellContext {
    /// Copy the set fields onto `command`, leaving the others alone
    fn apply(&self, command: &mut Command) {
        if let Some(user) = &self.user {
            command.set_remote_user(Some(user.clone()));
        }
        if let Some(shell) = &self.shell {
            command.set_remote_shell(Some(shell.clone()));
        }
        if let Some(path) = &self.path {
            command.set_remote_path(Some(path.clone()));
        }
        if let Some(env) = &self.env {
            command.set_remote_env(Some(env.clone()));
        }
    }
}

/// One machine reachable through a [`RemoteExecutor`]
pub struct Host {
    name: String,
    executor: Arc<dyn RemoteExecutor>,
    context: ShellContext,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("executor", &self.executor.executor_type())
            .field("context", &self.context)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Host {
    pub fn new(name: impl Into<String>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            name: name.into(),
            executor,
            context: ShellContext::default(),
            timeout: None,
        }
    }

    /// Bound every command by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ShellContext) -> Self {
        self.context = context;
        self
    }

    /// Run shell operations as `user`
    #[must_use]
    pub fn su(mut self, user: impl Into<String>) -> Self {
        self.context.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.context.shell = Some(shell.into());
        self
    }

    /// Run shell operations from `path`
    #[must_use]
    pub fn chdir(mut self, path: impl Into<String>) -> Self {
        self.context.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.context.env = Some(env.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn context(&self) -> &ShellContext {
        &self.context
    }

    #[must_use]
    pub fn executor_type(&self) -> &'static str {
        self.executor.executor_type()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.executor.is_connected()
    }

    async fn dispatch(&self, command: &mut Command) -> Result<(), ExecError> {
        match self.timeout {
            Some(timeout) => self.executor.execute_with_timeout(command, timeout).await,
            None => self.executor.execute(command).await,
        }
    }

    /// Run `command` as is
    ///
    /// A transport error is logged and leaves the command without an exit
    /// status, so the returned command reports failure.
    #[instrument(skip_all, fields(host = %self.name))]
    pub async fn execute(&self, mut command: Command) -> Command {
        if let Err(e) = self.dispatch(&mut command).await {
            error!(
                host = %self.name,
                command = %command.raw_command(),
                error = %e,
                "execution failed"
            );
        }
        command
    }

    /// Run `command`, surfacing transport errors instead of logging them
    ///
    /// # Errors
    /// Returns `HostError::Exec` when the executor fails
    #[instrument(skip_all, fields(host = %self.name))]
    pub async fn try_execute(&self, mut command: Command) -> Result<Command, HostError> {
        self.dispatch(&mut command).await?;
        Ok(command)
    }

    /// Run `command` under this host's elevation context
    pub async fn execute_shell(&self, mut command: Command) -> Command {
        self.context.apply(&mut command);
        self.execute(command).await
    }

    /// Run `command` and parse it with the parser registered as `operation`
    pub async fn run(
        &self,
        operation: &str,
        command: Command,
        registry: &ParserRegistry,
    ) -> CommandResult<Structured> {
        let command = self.execute_shell(command).await;
        registry.result(operation, command)
    }

    /// Process table, optionally filtered by user or pid
    pub async fn ps(&self, options: &PsOptions) -> CommandResult<Vec<ProcessInfo>> {
        let command = self.execute_shell(options.command()).await;
        CommandResult::parsed(command, &PsParser::new(options))
    }

    /// Send `signal` (`KILL`, `SIGTERM`, `9`, ...) to `pids`
    ///
    /// # Errors
    /// Returns `HostError::InvalidArgument` without dispatching when the
    /// signal is unknown or no pid is given
    pub async fn kill(&self, signal: &str, pids: &[u32]) -> Result<CommandResult<()>, HostError> {
        let name = signal_name(signal)
            .ok_or_else(|| HostError::InvalidArgument(format!("unknown signal: {signal}")))?;
        if pids.is_empty() {
            return Err(HostError::InvalidArgument("no pids given".to_string()));
        }

        let mut command = Command::new("kill");
        command.append(format!("-{name}"));
        for pid in pids {
            command.append(pid);
        }

        debug!(host = %self.name, signal = name, count = pids.len(), "sending signal");
        Ok(CommandResult::unparsed(self.execute_shell(command).await))
    }

    pub async fn uptime(&self) -> CommandResult<Uptime> {
        let command = self.execute_shell(uptime::command()).await;
        CommandResult::parsed(command, &UptimeParser)
    }

    /// Logged-in users
    pub async fn who(&self) -> CommandResult<Vec<UserSession>> {
        let command = self.execute_shell(who::command()).await;
        CommandResult::parsed(command, &WhoParser)
    }

    /// Environment as seen by shell operations
    pub async fn load_env(&self) -> CommandResult<BTreeMap<String, String>> {
        let command = self.execute_shell(env::command()).await;
        CommandResult::parsed(command, &EnvParser)
    }

    pub async fn hostname(&self) -> CommandResult<String> {
        let command = self.execute(hostname::command()).await;
        CommandResult::parsed(command, &HostnameParser)
    }

    /// Whether a trivial command completes successfully
    pub async fn ping(&self) -> bool {
        self.execute(Command::new("true")).await.success()
    }

    /// Close the underlying session
    ///
    /// # Errors
    /// Returns `HostError::Exec` when the transport fails to disconnect
    pub async fn disconnect(&self) -> Result<(), HostError> {
        self.executor.disconnect().await?;
        Ok(())
    }
}

/// Canonical short name (`KILL`) for a signal given by name or number
fn signal_name(signal: &str) -> Option<&'static str> {
    let signal = signal.trim();
    let parsed = match signal.parse::<i32>() {
        Ok(number) => Signal::try_from(number).ok(),
        Err(_) => {
            let upper = signal.to_ascii_uppercase();
            let full = if upper.starts_with("SIG") {
                upper
            } else {
                format!("SIG{upper}")
            };
            Signal::from_str(&full).ok()
        }
    };

    parsed.map(|s| s.as_str().trim_start_matches("SIG"))
}
