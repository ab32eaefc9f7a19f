//! fleetsh-core: Hosts, clusters and typed results
//!
//! A [`Host`] wraps one executor with an elevation context and exposes
//! typed operations (`ps`, `uptime`, `kill`, ...). A [`Cluster`] runs an
//! operation on every host concurrently and returns one [`HostOutcome`] per
//! host, in host order.

pub mod cluster;
pub mod config;
pub mod error;
pub mod factory;
pub mod host;
pub mod registry;
pub mod result;

pub use cluster::{Cluster, ClusterOutcome, HostOutcome};
pub use config::{CONFIG_ENV, ClusterConfig, HostConfig};
pub use error::{CoreError, HostError};
pub use factory::{DefaultExecutorFactory, ExecutorFactory, UnavailableExecutor};
pub use host::{Host, ShellContext};
pub use registry::{ParserRegistry, Structured};
pub use result::{CommandResult, Succeeded};

pub use fleetsh_exec::{Command, RemoteExecutor};
