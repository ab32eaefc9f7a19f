//! fleetsh-parse: Typed views of command output
//!
//! Parsers turn the captured stdout of a completed [`Command`] into typed
//! records (process tables, uptime, login sessions). They never execute
//! anything; each module also builds the command whose output it expects.
//!
//! [`Command`]: fleetsh_exec::Command

pub mod env;
pub mod error;
pub mod hostname;
pub mod ps;
pub mod traits;
pub mod types;
pub mod uptime;
pub mod who;

pub use env::EnvParser;
pub use error::ParseError;
pub use hostname::{HostnameParser, TextParser};
pub use ps::{PsOptions, PsParser};
pub use traits::Parser;
pub use types::{ProcessInfo, SchedulingPolicy, Uptime, UserSession};
pub use uptime::UptimeParser;
pub use who::WhoParser;
