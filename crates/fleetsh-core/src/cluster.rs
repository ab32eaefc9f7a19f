//! Fan-out of one operation across many hosts
//!
//! Every host runs concurrently in its own task. Outcomes come back in the
//! order the hosts were configured, regardless of which finished first, and
//! one host failing never affects another's outcome.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fleetsh_exec::{Command, RemoteExecutor};
use fleetsh_parse::{ProcessInfo, PsOptions, Uptime};
use futures::future::join_all;
use tokio::task::AbortHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{error, info, instrument, warn};

use crate::config::ClusterConfig;
use crate::error::{CoreError, HostError};
use crate::factory::{ExecutorFactory, UnavailableExecutor};
use crate::host::Host;
use crate::result::{CommandResult, Succeeded};

/// One host's share of a cluster operation
#[derive(Debug, Clone)]
pub struct HostOutcome<T> {
    pub host: String,
    pub result: Result<T, HostError>,
}

impl<T> HostOutcome<T> {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl<T: Succeeded> HostOutcome<T> {
    /// Whether the operation ran and reported success
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_ok_and(Succeeded::succeeded)
    }
}

/// Per-host outcomes in host order
#[derive(Debug, Clone)]
pub struct ClusterOutcome<T> {
    outcomes: Vec<HostOutcome<T>>,
}

impl<T> ClusterOutcome<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostOutcome<T>> {
        self.outcomes.iter()
    }

    /// Outcome for the host named `host`
    #[must_use]
    pub fn get(&self, host: &str) -> Option<&HostOutcome<T>> {
        self.outcomes.iter().find(|o| o.host == host)
    }

    /// Host names, in order
    #[must_use]
    pub fn hosts(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.host.as_str()).collect()
    }

    /// Names of hosts whose operation returned an error
    ///
    /// A command that ran and exited non-zero is not an error here, see
    /// [`unsuccessful_hosts`](Self::unsuccessful_hosts).
    #[must_use]
    pub fn errored_hosts(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.host.as_str())
            .collect()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<HostOutcome<T>> {
        self.outcomes
    }
}

impl<T: Succeeded> ClusterOutcome<T> {
    /// Names of hosts that errored or whose result reports failure
    #[must_use]
    pub fn unsuccessful_hosts(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.host.as_str())
            .collect()
    }

    /// Whether every host ran the operation successfully
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(HostOutcome::is_success)
    }
}

impl ClusterOutcome<bool> {
    /// Whether every host answered a ping
    #[must_use]
    pub fn all_reachable(&self) -> bool {
        self.all_succeeded()
    }
}

impl<T> IntoIterator for ClusterOutcome<T> {
    type Item = HostOutcome<T>;
    type IntoIter = std::vec::IntoIter<HostOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ClusterOutcome<T> {
    type Item = &'a HostOutcome<T>;
    type IntoIter = std::slice::Iter<'a, HostOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Aborts still-running host tasks when the caller stops waiting
struct AbortGuard(Vec<AbortHandle>);

impl Drop for AbortGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// An ordered set of uniquely named hosts
#[derive(Debug)]
pub struct Cluster {
    hosts: Vec<Arc<Host>>,
    deadline: Option<Duration>,
}

impl Cluster {
    /// Cluster over `hosts`, in the given order
    ///
    /// # Errors
    /// Returns `CoreError::DuplicateHost` when two hosts share a name
    pub fn new(hosts: Vec<Host>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for host in &hosts {
            if !seen.insert(host.name().to_string()) {
                return Err(CoreError::DuplicateHost(host.name().to_string()));
            }
        }

        Ok(Self {
            hosts: hosts.into_iter().map(Arc::new).collect(),
            deadline: None,
        })
    }

    /// Build every configured host through `factory`
    ///
    /// A host whose executor cannot be created stays in the cluster and
    /// reports the construction error from every command it is given.
    ///
    /// # Errors
    /// Returns error if the config is invalid
    pub fn from_config(
        config: &ClusterConfig,
        factory: &dyn ExecutorFactory,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let mut hosts = Vec::with_capacity(config.hosts.len());
        for host_config in &config.hosts {
            let executor: Arc<dyn RemoteExecutor> = match factory.create_executor(host_config) {
                Ok(executor) => executor,
                Err(e) => {
                    error!(host = %host_config.name, error = %e, "failed to create executor");
                    Arc::new(UnavailableExecutor::new(e))
                }
            };
            let host = Host::new(&host_config.name, executor)
                .with_timeout(config.command_timeout())
                .with_context(host_config.shell_context());
            hosts.push(host);
        }

        info!(hosts = hosts.len(), "cluster configured");
        Ok(Self::new(hosts)?.with_deadline(config.deadline()))
    }

    /// Report hosts still running after `deadline` as incomplete
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts().find(|h| h.name() == name)
    }

    /// Run `operation` on every host concurrently
    pub async fn run<T, F, Fut>(&self, operation: F) -> ClusterOutcome<T>
    where
        F: Fn(Arc<Host>) -> Fut,
        Fut: Future<Output = Result<T, HostError>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_deadline(self.deadline, operation).await
    }

    /// Run `operation` on every host, giving up on hosts still running
    /// after `deadline`
    #[instrument(skip_all, fields(hosts = self.hosts.len()))]
    pub async fn run_with_deadline<T, F, Fut>(
        &self,
        deadline: Option<Duration>,
        operation: F,
    ) -> ClusterOutcome<T>
    where
        F: Fn(Arc<Host>) -> Fut,
        Fut: Future<Output = Result<T, HostError>> + Send + 'static,
        T: Send + 'static,
    {
        let deadline_at = deadline.map(|d| Instant::now() + d);
        info!(hosts = self.hosts.len(), ?deadline, "dispatching to cluster");

        let tasks: Vec<_> = self
            .hosts
            .iter()
            .map(|host| {
                let fut = operation(Arc::clone(host));
                tokio::spawn(async move {
                    match deadline_at {
                        Some(at) => timeout_at(at, fut)
                            .await
                            .unwrap_or(Err(HostError::Incomplete)),
                        None => fut.await,
                    }
                })
            })
            .collect();

        let guard = AbortGuard(tasks.iter().map(tokio::task::JoinHandle::abort_handle).collect());
        let joined = join_all(tasks).await;
        drop(guard);

        let outcomes: Vec<HostOutcome<T>> = self
            .hosts
            .iter()
            .zip(joined)
            .map(|(host, joined)| {
                let result = joined
                    .unwrap_or_else(|e| Err(HostError::TaskPanicked(e.to_string())));
                if let Err(e) = &result {
                    warn!(host = %host.name(), error = %e, "host operation failed");
                }
                HostOutcome {
                    host: host.name().to_string(),
                    result,
                }
            })
            .collect();

        let errored = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(hosts = outcomes.len(), errored, "cluster operation finished");

        ClusterOutcome { outcomes }
    }

    /// Run `command` as is on every host
    pub async fn execute(&self, command: &Command) -> ClusterOutcome<Command> {
        self.run(|host| {
            let command = command.clone();
            async move { Ok(host.execute(command).await) }
        })
        .await
    }

    /// Run `command` on every host under each host's elevation context
    pub async fn execute_shell(&self, command: &Command) -> ClusterOutcome<Command> {
        self.run(|host| {
            let command = command.clone();
            async move { Ok(host.execute_shell(command).await) }
        })
        .await
    }

    pub async fn hostname(&self) -> ClusterOutcome<CommandResult<String>> {
        self.run(|host| async move { Ok(host.hostname().await) }).await
    }

    /// Reachability of every host
    pub async fn ping(&self) -> ClusterOutcome<bool> {
        self.run(|host| async move { Ok(host.ping().await) }).await
    }

    pub async fn uptime(&self) -> ClusterOutcome<CommandResult<Uptime>> {
        self.run(|host| async move { Ok(host.uptime().await) }).await
    }

    pub async fn ps(&self, options: &PsOptions) -> ClusterOutcome<CommandResult<Vec<ProcessInfo>>> {
        self.run(|host| {
            let options = options.clone();
            async move { Ok(host.ps(&options).await) }
        })
        .await
    }

    /// Close every host's session
    pub async fn disconnect(&self) -> ClusterOutcome<()> {
        self.run(|host| async move { host.disconnect().await }).await
    }
}
