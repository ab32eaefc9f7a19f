//! Shell command builder and execution sink
//!
//! A [`Command`] is composed incrementally, handed to a
//! [`RemoteExecutor`](crate::traits::RemoteExecutor), and then holds whatever
//! the remote side reported back: exit status, output chunks, signal.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single shell invocation and its captured outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    raw_command: String,
    remote_user: Option<String>,
    remote_shell: Option<String>,
    remote_path: Option<String>,
    remote_env: Option<String>,
    exit_status: Option<i32>,
    output: Vec<String>,
    stderr: Vec<String>,
    signal: Option<String>,
}

impl Command {
    /// Create a command from literal shell text
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            raw_command: command.into(),
            ..Self::default()
        }
    }

    /// The command text as composed so far, without elevation wrapping
    #[must_use]
    pub fn raw_command(&self) -> &str {
        &self.raw_command
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    /// Append free-form text separated by a space
    pub fn append(&mut self, value: impl fmt::Display) -> &mut Self {
        self.raw_command = format!("{} {value}", self.raw_command);
        self
    }

    /// Append `arg` when `enabled` is true
    pub fn append_flag(&mut self, arg: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.append(arg);
        }
        self
    }

    /// Append `arg` unconditionally as a switch
    pub fn flag(&mut self, arg: &str) -> &mut Self {
        self.append_flag(arg, true)
    }

    /// Append `arg value` when `value` is present and non-empty
    pub fn append_arg(&mut self, arg: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.raw_command = format!("{} {arg} {value}", self.raw_command);
        }
        self
    }

    /// Pipe this command into `other`
    ///
    /// Composition is textual: the result is still one shell invocation.
    pub fn pipe(&mut self, other: impl AsRef<str>) -> &mut Self {
        self.append(format_args!("| {}", other.as_ref()))
    }

    // ------------------------------------------------------------------
    // Elevation context
    // ------------------------------------------------------------------

    /// Run as this user (requires a shell as well)
    #[must_use]
    pub fn with_remote_user(mut self, user: impl Into<String>) -> Self {
        self.remote_user = Some(user.into());
        self
    }

    /// Shell used for the elevated invocation
    #[must_use]
    pub fn with_remote_shell(mut self, shell: impl Into<String>) -> Self {
        self.remote_shell = Some(shell.into());
        self
    }

    /// Directory to change into before running
    #[must_use]
    pub fn with_remote_path(mut self, path: impl Into<String>) -> Self {
        self.remote_path = Some(path.into());
        self
    }

    /// One-shot environment assignment, e.g. `FOO=bar BAZ=1`
    #[must_use]
    pub fn with_remote_env(mut self, env: impl Into<String>) -> Self {
        self.remote_env = Some(env.into());
        self
    }

    pub fn set_remote_user(&mut self, user: Option<String>) {
        self.remote_user = user;
    }

    pub fn set_remote_shell(&mut self, shell: Option<String>) {
        self.remote_shell = shell;
    }

    pub fn set_remote_path(&mut self, path: Option<String>) {
        self.remote_path = path;
    }

    pub fn set_remote_env(&mut self, env: Option<String>) {
        self.remote_env = env;
    }

    /// Final text sent to the executor
    ///
    /// Wrapped in a `sudo` invocation only when both remote user and remote
    /// shell are set, otherwise the raw command unchanged.
    #[must_use]
    pub fn prepared_command(&self) -> String {
        match (&self.remote_user, &self.remote_shell) {
            (Some(user), Some(shell)) => elevate(
                &self.raw_command,
                user,
                shell,
                self.remote_path.as_deref(),
                self.remote_env.as_deref(),
            ),
            _ => self.raw_command.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Executor callbacks
    // ------------------------------------------------------------------

    /// Record the exit status; only the first call has any effect
    pub fn handle_status(&mut self, status: i32) {
        if let Some(existing) = self.exit_status {
            warn!(existing, ignored = status, "exit status already recorded");
            return;
        }
        self.exit_status = Some(status);
    }

    /// Append a stdout chunk
    pub fn handle_data(&mut self, data: impl Into<String>) {
        self.output.push(data.into());
    }

    /// Append a stderr chunk
    pub fn handle_stderr(&mut self, data: impl Into<String>) {
        self.stderr.push(data.into());
    }

    /// Record the terminating signal; only the first call has any effect
    pub fn handle_signal(&mut self, signal: impl Into<String>) {
        let signal = signal.into();
        if let Some(existing) = &self.signal {
            warn!(existing = %existing, ignored = %signal, "signal already recorded");
            return;
        }
        self.signal = Some(signal);
    }

    // ------------------------------------------------------------------
    // Outcome
    // ------------------------------------------------------------------

    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    #[must_use]
    pub fn signal(&self) -> Option<&str> {
        self.signal.as_deref()
    }

    /// Raw stdout chunks in arrival order
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Captured stderr, concatenated
    #[must_use]
    pub fn stderr(&self) -> String {
        self.stderr.concat()
    }

    /// True iff an exit status was recorded and it is zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    #[must_use]
    pub fn failure(&self) -> bool {
        !self.success()
    }

    /// Whether the remote side reported an exit status or a signal
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.exit_status.is_some() || self.signal.is_some()
    }

    /// Stdout chunks concatenated
    #[must_use]
    pub fn raw_output(&self) -> String {
        self.output.concat()
    }

    /// Stdout split into lines with surrounding whitespace trimmed
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.raw_output()
            .lines()
            .map(|line| line.trim().to_string())
            .collect()
    }

    /// Trimmed lines joined by a single space
    #[must_use]
    pub fn text(&self) -> String {
        self.lines().join(" ")
    }

    /// Leading integer of the trimmed lines joined together, if any
    #[must_use]
    pub fn to_int(&self) -> Option<i64> {
        leading_int(&self.lines().concat())
    }

    /// Stdout decoded as JSON, if it is valid JSON
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.text()).ok()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_command)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.raw_command
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Wrap `command` so it runs as `user` under `shell`
///
/// Output format: `{env }sudo -u {user} {shell} -c -l "{inner}"`, where
/// `inner` is `cd {path} && {command}` for a non-empty path. No escaping is
/// applied to any part.
#[must_use]
pub fn elevate(
    command: &str,
    user: &str,
    shell: &str,
    path: Option<&str>,
    env: Option<&str>,
) -> String {
    let inner = match path.filter(|p| !p.is_empty()) {
        Some(path) => format!("cd {path} && {command}"),
        None => command.to_string(),
    };

    let env = match env.filter(|e| !e.is_empty()) {
        Some(env) => format!("{env} "),
        None => String::new(),
    };

    format!("{env}sudo -u {user} {shell} -c -l \"{inner}\"")
}

fn leading_int(text: &str) -> Option<i64> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
