//! Typed records produced by the built-in parsers

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the process table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub uid: u32,
    pub user: String,
    pub gid: u32,
    pub group: String,
    pub pid: u32,
    pub ppid: u32,
    /// Percent of one CPU
    pub cpu_usage: f32,
    /// Percent of physical memory
    pub memory_usage: f32,
    /// State code, e.g. `Ss` or `R+`
    pub stat: String,
    pub priority: i32,
    pub flags: u32,
    /// Policy as printed by ps, e.g. `TS`
    pub policy_abbr: String,
    pub policy: SchedulingPolicy,
    /// Cumulative CPU time in seconds
    pub cpu_time: u64,
    /// Full command line
    pub command: String,
}

/// Kernel scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    Other,
    Fifo,
    RoundRobin,
    Batch,
    Iso,
    Idle,
    Deadline,
    Unknown,
}

impl SchedulingPolicy {
    /// Map the abbreviation printed by `ps -o policy`
    #[must_use]
    pub fn from_abbr(abbr: &str) -> Self {
        match abbr {
            "TS" => SchedulingPolicy::Other,
            "FF" => SchedulingPolicy::Fifo,
            "RR" => SchedulingPolicy::RoundRobin,
            "B" => SchedulingPolicy::Batch,
            "ISO" => SchedulingPolicy::Iso,
            "IDL" => SchedulingPolicy::Idle,
            "DLN" => SchedulingPolicy::Deadline,
            _ => SchedulingPolicy::Unknown,
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulingPolicy::Other => "SCHED_OTHER",
            SchedulingPolicy::Fifo => "SCHED_FIFO",
            SchedulingPolicy::RoundRobin => "SCHED_RR",
            SchedulingPolicy::Batch => "SCHED_BATCH",
            SchedulingPolicy::Iso => "SCHED_ISO",
            SchedulingPolicy::Idle => "SCHED_IDLE",
            SchedulingPolicy::Deadline => "SCHED_DEADLINE",
            SchedulingPolicy::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Time since boot
///
/// `seconds`, `minutes`, `hours` and `days` are each the full uptime
/// expressed in that unit, rounded down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uptime {
    pub boot_time: DateTime<Utc>,
    /// Exact uptime in seconds as reported by the kernel
    pub uptime: f64,
    pub seconds: u64,
    pub minutes: u64,
    pub hours: u64,
    pub days: u64,
}

/// A logged-in user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user: String,
    pub tty: String,
    /// Local login time, when `who` printed it in ISO form
    pub login_time: Option<NaiveDateTime>,
    /// Remote address or display, if any
    pub remote_host: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_abbr() {
        assert_eq!(SchedulingPolicy::from_abbr("TS"), SchedulingPolicy::Other);
        assert_eq!(SchedulingPolicy::from_abbr("RR"), SchedulingPolicy::RoundRobin);
        assert_eq!(SchedulingPolicy::from_abbr("-"), SchedulingPolicy::Unknown);
        assert_eq!(SchedulingPolicy::Fifo.to_string(), "SCHED_FIFO");
    }
}
