//! Uptime via `/proc/uptime`

use chrono::DateTime;
use fleetsh_exec::Command;

use crate::error::{ParseError, number};
use crate::traits::Parser;
use crate::types::Uptime;

/// Reads the kernel uptime and the remote clock in one round trip
///
/// The remote clock is needed to compute boot time without consulting the
/// local clock.
#[must_use]
pub fn command() -> Command {
    Command::new("cat /proc/uptime && date +%s")
}

/// Parses the output of [`command`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UptimeParser;

impl Parser for UptimeParser {
    type Output = Uptime;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn parse(&self, command: &Command) -> Result<Uptime, ParseError> {
        let lines = command.lines();
        let mut lines = lines.iter().filter(|l| !l.is_empty());

        let uptime_line = lines.next().ok_or(ParseError::Empty)?;
        let clock_line = lines
            .next()
            .ok_or_else(|| ParseError::invalid_line(uptime_line, "missing remote clock"))?;

        let first = uptime_line
            .split_whitespace()
            .next()
            .ok_or_else(|| ParseError::invalid_line(uptime_line, "no uptime value"))?;
        let uptime: f64 = number("uptime", first)?;
        if !uptime.is_finite() || uptime < 0.0 {
            return Err(ParseError::invalid_line(uptime_line, "uptime out of range"));
        }

        let now: i64 = number("date", clock_line.trim())?;

        let seconds = uptime.floor() as u64;
        let boot_time = i64::try_from(seconds)
            .ok()
            .and_then(|s| now.checked_sub(s))
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .ok_or_else(|| ParseError::invalid_line(clock_line, "timestamp out of range"))?;

        Ok(Uptime {
            boot_time,
            uptime,
            seconds,
            minutes: seconds / 60,
            hours: seconds / 3_600,
            days: seconds / 86_400,
        })
    }
}
