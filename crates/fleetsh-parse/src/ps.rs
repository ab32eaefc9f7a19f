//! Process table via `ps`

use fleetsh_exec::Command;
use tracing::debug;

use crate::error::{ParseError, number};
use crate::traits::Parser;
use crate::types::{ProcessInfo, SchedulingPolicy};

/// Output columns, all with empty headers so ps prints no header line
const COLUMNS: &str = "uid=,user:32=,gid=,group:32=,pid=,ppid=,pcpu=,pmem=,stat=,pri=,flags=,policy=,time=,args=";

/// Number of whitespace-separated fields before `args`
const FIXED_FIELDS: usize = 13;

/// Selection for a process listing
#[derive(Debug, Clone, Default)]
pub struct PsOptions {
    /// Only processes owned by these users (names or uids)
    pub users: Vec<String>,
    /// Only these pids
    pub pids: Vec<u32>,
}

impl PsOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.users.push(user.into());
        self
    }

    #[must_use]
    pub fn pid(mut self, pid: u32) -> Self {
        self.pids.push(pid);
        self
    }

    /// Build the `ps` invocation for these options
    #[must_use]
    pub fn command(&self) -> Command {
        let users = self.users.join(",");
        let pids = self
            .pids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut cmd = Command::new("ps ww");
        cmd.append_flag("ax", self.users.is_empty() && self.pids.is_empty())
            .append_arg("--user", Some(users.as_str()))
            .append_arg("--pid", Some(pids.as_str()))
            .append_arg("-o", Some(COLUMNS));
        cmd
    }
}

/// Parses the output of [`PsOptions::command`]
///
/// Rows not matching the user filter are dropped, so the filter holds even
/// when the remote `ps` ignores `--user`.
#[derive(Debug, Clone, Default)]
pub struct PsParser {
    users: Vec<String>,
}

impl PsParser {
    #[must_use]
    pub fn new(options: &PsOptions) -> Self {
        Self {
            users: options.users.clone(),
        }
    }

    fn wanted(&self, process: &ProcessInfo) -> bool {
        self.users.is_empty()
            || self
                .users
                .iter()
                .any(|u| *u == process.user || *u == process.uid.to_string())
    }
}

impl Parser for PsParser {
    type Output = Vec<ProcessInfo>;

    fn parse(&self, command: &Command) -> Result<Vec<ProcessInfo>, ParseError> {
        let output = command.raw_output();
        let mut processes = Vec::new();

        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            let process = parse_line(line)?;
            if self.wanted(&process) {
                processes.push(process);
            }
        }

        debug!(count = processes.len(), "parsed process table");
        Ok(processes)
    }
}

fn parse_line(line: &str) -> Result<ProcessInfo, ParseError> {
    let (fields, args) = split_fields(line, FIXED_FIELDS)
        .ok_or_else(|| ParseError::invalid_line(line, "too few columns"))?;

    let policy_abbr = fields[11].to_string();

    Ok(ProcessInfo {
        uid: number("uid", fields[0])?,
        user: fields[1].to_string(),
        gid: number("gid", fields[2])?,
        group: fields[3].to_string(),
        pid: number("pid", fields[4])?,
        ppid: number("ppid", fields[5])?,
        cpu_usage: number("pcpu", fields[6])?,
        memory_usage: number("pmem", fields[7])?,
        stat: fields[8].to_string(),
        priority: number("pri", fields[9])?,
        flags: number("flags", fields[10])?,
        policy: SchedulingPolicy::from_abbr(&policy_abbr),
        policy_abbr,
        cpu_time: parse_cpu_time(fields[12])?,
        command: args.to_string(),
    })
}

/// Split off `n` whitespace-separated fields, returning them and the
/// untouched remainder of the line
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line.trim_start();

    while fields.len() < n {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }

    Some((fields, rest.trim_end()))
}

/// `[DD-]HH:MM:SS` or `MM:SS` to seconds
fn parse_cpu_time(value: &str) -> Result<u64, ParseError> {
    let (days, clock) = match value.split_once('-') {
        Some((d, c)) => (number::<u64>("time", d)?, c),
        None => (0, value),
    };

    let overflow = || ParseError::InvalidNumber {
        field: "time",
        value: value.to_string(),
    };

    let mut seconds = 0u64;
    for part in clock.split(':') {
        let part = number::<u64>("time", part)?;
        seconds = seconds
            .checked_mul(60)
            .and_then(|s| s.checked_add(part))
            .ok_or_else(overflow)?;
    }

    days.checked_mul(86_400)
        .and_then(|d| d.checked_add(seconds))
        .ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "    0 root            0 root            1     0  0.0  0.3 Ss    19     4 TS   00:00:03 /sbin/init splash
 1000 ubuntu       1000 ubuntu       4242  4200  1.5  0.1 S+    19     0 TS   00:00:00 sleep  100000
 1000 ubuntu       1000 ubuntu       4300  4200  0.0  0.0 R+    19     0 TS   00:00:00 ps ww --user ubuntu -o x
    0 root            0 root           12     2  0.0  0.0 S     139    1 FF   1-00:00:10 [migration/0]
";

    fn command_with(output: &str) -> Command {
        let mut cmd = Command::new("ps");
        cmd.handle_data(output);
        cmd.handle_status(0);
        cmd
    }

    #[test]
    fn test_command_defaults_to_all_processes() {
        let cmd = PsOptions::new().command();
        assert_eq!(cmd.raw_command(), format!("ps ww ax -o {COLUMNS}"));
    }

    #[test]
    fn test_command_with_filters() {
        let cmd = PsOptions::new()
            .user("ubuntu")
            .user("deploy")
            .pid(1)
            .pid(42)
            .command();

        assert_eq!(
            cmd.raw_command(),
            format!("ps ww --user ubuntu,deploy --pid 1,42 -o {COLUMNS}")
        );
    }

    #[test]
    fn test_parse_rows() {
        let processes = PsParser::default().parse(&command_with(SAMPLE)).unwrap();

        assert_eq!(processes.len(), 4);

        let init = &processes[0];
        assert_eq!(init.pid, 1);
        assert_eq!(init.user, "root");
        assert_eq!(init.policy, SchedulingPolicy::Other);
        assert_eq!(init.cpu_time, 3);
        assert_eq!(init.command, "/sbin/init splash");

        // Inner spacing of the command line is preserved
        assert_eq!(processes[1].command, "sleep  100000");
        assert!((processes[1].cpu_usage - 1.5).abs() < f32::EPSILON);

        let migration = &processes[3];
        assert_eq!(migration.policy_abbr, "FF");
        assert_eq!(migration.cpu_time, 86_410);
        assert_eq!(migration.priority, 139);
    }

    #[test]
    fn test_user_filter_applied() {
        let options = PsOptions::new().user("ubuntu");
        let processes = PsParser::new(&options).parse(&command_with(SAMPLE)).unwrap();

        assert_eq!(processes.len(), 2);
        assert!(processes.iter().all(|p| p.user == "ubuntu"));
    }

    #[test]
    fn test_filter_by_uid() {
        let options = PsOptions::new().user("0");
        let processes = PsParser::new(&options).parse(&command_with(SAMPLE)).unwrap();

        assert_eq!(processes.len(), 2);
        assert!(processes.iter().all(|p| p.uid == 0));
    }

    #[test]
    fn test_short_row_is_an_error() {
        let err = PsParser::default()
            .parse(&command_with("1000 ubuntu 1000\n"))
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidLine { .. }));
    }

    #[test]
    fn test_empty_output_is_empty_table() {
        let processes = PsParser::default().parse(&command_with("")).unwrap();
        assert!(processes.is_empty());
    }

    #[test]
    fn test_parse_cpu_time() {
        assert_eq!(parse_cpu_time("00:01:05").unwrap(), 65);
        assert_eq!(parse_cpu_time("02:03").unwrap(), 123);
        assert_eq!(parse_cpu_time("2-00:00:00").unwrap(), 172_800);
        assert!(parse_cpu_time("xx").is_err());
    }

    #[test]
    fn test_cpu_time_overflow_is_an_error() {
        assert!(matches!(
            parse_cpu_time("999999999999999-00:00:00"),
            Err(ParseError::InvalidNumber { field: "time", .. })
        ));
        assert!(parse_cpu_time("18446744073709551615:00").is_err());

        let row = " 1000 ubuntu 1000 ubuntu 10 1 0.0 0.1 S 19 0 TS 999999999999999-00:00:00 bash\n";
        let err = PsParser::default().parse(&command_with(row)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }
}
