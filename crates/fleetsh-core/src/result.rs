//! Typed command results

use fleetsh_exec::Command;
use fleetsh_parse::{ParseError, Parser};
use tracing::warn;

use crate::error::HostError;

/// A completed command plus the structured data parsed from its output
///
/// Success follows the exit status alone. The parser runs only for
/// successful commands, and a parser error leaves [`data`](Self::data)
/// empty without turning the result into a failure.
#[derive(Debug, Clone)]
pub struct CommandResult<T> {
    command: Command,
    data: Option<T>,
    parse_error: Option<ParseError>,
}

impl<T> CommandResult<T> {
    /// Wrap `command` and apply `parser` to its output
    pub fn parsed<P>(command: Command, parser: &P) -> Self
    where
        P: Parser<Output = T> + ?Sized,
    {
        if command.failure() {
            return Self::unparsed(command);
        }

        match parser.parse(&command) {
            Ok(data) => Self {
                command,
                data: Some(data),
                parse_error: None,
            },
            Err(e) => {
                warn!(command = %command.raw_command(), error = %e, "failed to parse command output");
                Self {
                    command,
                    data: None,
                    parse_error: Some(e),
                }
            }
        }
    }

    /// Wrap `command` without structured data
    #[must_use]
    pub fn unparsed(command: Command) -> Self {
        Self {
            command,
            data: None,
            parse_error: None,
        }
    }

    #[must_use]
    pub fn command(&self) -> &Command {
        &self.command
    }

    #[must_use]
    pub fn into_command(self) -> Command {
        self.command
    }

    /// Parsed data, absent when the command failed or parsing failed
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    #[must_use]
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.command.success()
    }

    #[must_use]
    pub fn failure(&self) -> bool {
        self.command.failure()
    }

    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        self.command.exit_status()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.command.lines()
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.command.text()
    }

    #[must_use]
    pub fn to_int(&self) -> Option<i64> {
        self.command.to_int()
    }

    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        self.command.to_json()
    }

    /// Turn a failed command into `HostError::CommandFailed`
    ///
    /// # Errors
    /// Returns `HostError::CommandFailed` when the exit status is not zero
    /// or was never recorded
    pub fn require_success(self) -> Result<Self, HostError> {
        if self.success() {
            Ok(self)
        } else {
            Err(HostError::CommandFailed {
                status: self.exit_status(),
                stderr: self.command.stderr(),
            })
        }
    }

    /// Successful data, or the reason there is none
    ///
    /// # Errors
    /// Returns `HostError::CommandFailed` for a failed command and
    /// `HostError::Parse` when the output did not parse
    pub fn into_result(self) -> Result<T, HostError> {
        let result = self.require_success()?;
        match (result.data, result.parse_error) {
            (Some(data), _) => Ok(data),
            (None, Some(e)) => Err(HostError::Parse(e)),
            (None, None) => Err(HostError::Parse(ParseError::Empty)),
        }
    }
}

impl<T> CommandResult<Vec<T>> {
    /// Parsed records, empty when there is no data
    #[must_use]
    pub fn items(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items().iter()
    }
}

/// Outcome values that carry their own notion of success
pub trait Succeeded {
    fn succeeded(&self) -> bool;
}

impl Succeeded for Command {
    fn succeeded(&self) -> bool {
        self.success()
    }
}

impl<T> Succeeded for CommandResult<T> {
    fn succeeded(&self) -> bool {
        self.success()
    }
}

impl Succeeded for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

impl Succeeded for () {
    fn succeeded(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use fleetsh_parse::{HostnameParser, PsParser};

    use super::*;

    fn completed(output: &str, status: Option<i32>) -> Command {
        let mut cmd = Command::new("test");
        cmd.handle_data(output);
        if let Some(status) = status {
            cmd.handle_status(status);
        }
        cmd
    }

    #[test]
    fn test_success_requires_zero_status() {
        let ok = CommandResult::<()>::unparsed(completed("", Some(0)));
        assert!(ok.success());

        let failed = CommandResult::<()>::unparsed(completed("", Some(2)));
        assert!(failed.failure());

        let never_ran = CommandResult::<()>::unparsed(Command::new("test"));
        assert!(never_ran.failure());
        assert_eq!(never_ran.exit_status(), None);
    }

    #[test]
    fn test_parsed_data() {
        let result = CommandResult::parsed(completed("web-1\n", Some(0)), &HostnameParser);

        assert!(result.success());
        assert_eq!(result.data().map(String::as_str), Some("web-1"));
        assert!(result.parse_error().is_none());
    }

    #[test]
    fn test_parse_error_keeps_success() {
        let result = CommandResult::parsed(completed("garbage\n", Some(0)), &PsParser::default());

        assert!(result.success());
        assert!(result.data().is_none());
        assert!(result.items().is_empty());
        assert!(matches!(result.parse_error(), Some(ParseError::InvalidLine { .. })));
    }

    #[test]
    fn test_failed_command_is_not_parsed() {
        let result = CommandResult::parsed(completed("web-1\n", Some(1)), &HostnameParser);

        assert!(result.failure());
        assert!(result.data().is_none());
        assert!(result.parse_error().is_none());
    }

    #[test]
    fn test_closure_parser() {
        let parser = |cmd: &Command| Ok::<_, ParseError>(cmd.lines().len());
        let result = CommandResult::parsed(completed("a\nb\nc\n", Some(0)), &parser);

        assert_eq!(result.data(), Some(&3));
    }

    #[test]
    fn test_into_result() {
        let ok = CommandResult::parsed(completed("db\n", Some(0)), &HostnameParser);
        assert_eq!(ok.into_result().unwrap(), "db");

        let mut failed = completed("", Some(127));
        failed.handle_stderr("hostname: not found");
        let err = CommandResult::parsed(failed, &HostnameParser)
            .into_result()
            .unwrap_err();
        assert_eq!(
            err,
            HostError::CommandFailed {
                status: Some(127),
                stderr: "hostname: not found".to_string()
            }
        );

        let empty = CommandResult::parsed(completed("", Some(0)), &HostnameParser);
        assert!(matches!(empty.into_result(), Err(HostError::Parse(ParseError::Empty))));
    }

    #[test]
    fn test_views_delegate() {
        let result = CommandResult::<()>::unparsed(completed("a\n", Some(0)));
        assert_eq!(result.lines(), vec!["a"]);
        assert_eq!(result.text(), "a");
        assert_eq!(result.to_int(), None);
    }
}
