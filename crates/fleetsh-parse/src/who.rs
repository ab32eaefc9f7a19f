//! Logged-in users via `who`

use chrono::NaiveDateTime;
use fleetsh_exec::Command;

use crate::error::ParseError;
use crate::traits::Parser;
use crate::types::UserSession;

const LOGIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[must_use]
pub fn command() -> Command {
    Command::new("who")
}

/// Parses `who` output
///
/// Login time is only decoded in the GNU ISO form (`2024-01-15 09:30`);
/// other formats leave it unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhoParser;

impl Parser for WhoParser {
    type Output = Vec<UserSession>;

    fn parse(&self, command: &Command) -> Result<Vec<UserSession>, ParseError> {
        command
            .lines()
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| parse_line(l))
            .collect()
    }
}

fn parse_line(line: &str) -> Result<UserSession, ParseError> {
    let (body, remote_host) = match line.rfind('(') {
        Some(start) if line.ends_with(')') => (
            line[..start].trim_end(),
            Some(line[start + 1..line.len() - 1].to_string()),
        ),
        _ => (line, None),
    };

    let mut parts = body.split_whitespace();
    let user = parts
        .next()
        .ok_or_else(|| ParseError::invalid_line(line, "missing user"))?;
    let tty = parts
        .next()
        .ok_or_else(|| ParseError::invalid_line(line, "missing terminal"))?;

    let time = parts.collect::<Vec<_>>().join(" ");
    let login_time = NaiveDateTime::parse_from_str(&time, LOGIN_TIME_FORMAT).ok();

    Ok(UserSession {
        user: user.to_string(),
        tty: tty.to_string(),
        login_time,
        remote_host: remote_host.filter(|h| !h.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn command_with(output: &str) -> Command {
        let mut cmd = command();
        cmd.handle_data(output);
        cmd.handle_status(0);
        cmd
    }

    #[test]
    fn test_parse_sessions() {
        let output = "ubuntu   pts/0        2024-01-15 09:30 (203.0.113.7)
root     tty1         2024-01-14 22:05
";
        let sessions = WhoParser.parse(&command_with(output)).unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].user, "ubuntu");
        assert_eq!(sessions[0].tty, "pts/0");
        assert_eq!(sessions[0].remote_host.as_deref(), Some("203.0.113.7"));

        let login = sessions[0].login_time.unwrap();
        assert_eq!((login.year(), login.month(), login.day()), (2024, 1, 15));
        assert_eq!((login.hour(), login.minute()), (9, 30));

        assert_eq!(sessions[1].tty, "tty1");
        assert!(sessions[1].remote_host.is_none());
    }

    #[test]
    fn test_bsd_time_format_left_unset() {
        let sessions = WhoParser
            .parse(&command_with("alice    console  Jan 15 09:30\n"))
            .unwrap();

        assert_eq!(sessions[0].user, "alice");
        assert!(sessions[0].login_time.is_none());
    }

    #[test]
    fn test_no_sessions() {
        assert!(WhoParser.parse(&command_with("")).unwrap().is_empty());
    }

    #[test]
    fn test_line_without_terminal() {
        let err = WhoParser.parse(&command_with("bob\n")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidLine { .. }));
    }
}
