//! fleetsh-exec: Command construction and single-host execution
//!
//! Provides the [`Command`] builder, the [`RemoteExecutor`] contract that
//! transports implement, and local and SSH transports.

pub mod chunk;
pub mod command;
pub mod connection;
pub mod error;
pub mod local;
pub mod ssh;
pub mod traits;

pub use command::{Command, elevate};
pub use connection::ConnectionInfo;
pub use error::ExecError;
pub use local::LocalExecutor;
pub use ssh::SshExecutor;
pub use traits::RemoteExecutor;
