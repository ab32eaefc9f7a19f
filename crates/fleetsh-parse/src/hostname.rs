//! Hostname and plain text output

use fleetsh_exec::Command;

use crate::error::ParseError;
use crate::traits::Parser;

#[must_use]
pub fn command() -> Command {
    Command::new("hostname")
}

/// First non-empty output line
#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameParser;

impl Parser for HostnameParser {
    type Output = String;

    fn parse(&self, command: &Command) -> Result<String, ParseError> {
        command
            .lines()
            .into_iter()
            .find(|l| !l.is_empty())
            .ok_or(ParseError::Empty)
    }
}

/// Whole output with surrounding whitespace removed
///
/// Empty output is valid and yields an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl Parser for TextParser {
    type Output = String;

    fn parse(&self, command: &Command) -> Result<String, ParseError> {
        Ok(command.raw_output().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname() {
        let mut cmd = command();
        cmd.handle_data("\nweb-1\n");
        assert_eq!(HostnameParser.parse(&cmd).unwrap(), "web-1");
    }

    #[test]
    fn test_text_keeps_inner_lines() {
        let mut cmd = Command::new("cat /etc/motd");
        cmd.handle_data("\n  hello\nworld  \n");
        assert_eq!(TextParser.parse(&cmd).unwrap(), "hello\nworld");
        assert_eq!(TextParser.parse(&Command::new("true")).unwrap(), "");
    }

    #[test]
    fn test_empty() {
        assert_eq!(HostnameParser.parse(&command()), Err(ParseError::Empty));
    }
}
