//! Core error types for fleetsh-core

use fleetsh_exec::ExecError;
use fleetsh_parse::ParseError;
use thiserror::Error;

/// Failure recorded as one host's outcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Transport error surfaced by a strict operation
    #[error("execution failed: {0}")]
    Exec(#[from] ExecError),

    /// Operation rejected before dispatch
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command did not exit with status zero
    #[error("command failed with status {status:?}: {stderr}")]
    CommandFailed {
        /// Exit status, absent when the command never completed
        status: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// Output could not be parsed by a strict operation
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Host did not settle before the cluster deadline
    #[error("host did not finish before the deadline")]
    Incomplete,

    /// The per-host task panicked or was cancelled
    #[error("host task failed: {0}")]
    TaskPanicked(String),
}

/// Errors raised while building hosts and clusters
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Configuration could not be read or is invalid
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Two hosts share a name
    #[error("duplicate host name: {0}")]
    DuplicateHost(String),
}
