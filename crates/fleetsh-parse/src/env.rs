//! Environment variables via `env`

use std::collections::BTreeMap;

use fleetsh_exec::Command;

use crate::error::ParseError;
use crate::traits::Parser;

#[must_use]
pub fn command() -> Command {
    Command::new("env")
}

/// Parses `KEY=VALUE` lines
///
/// A line without `=` continues the previous value (multi-line values).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvParser;

impl Parser for EnvParser {
    type Output = BTreeMap<String, String>;

    fn parse(&self, command: &Command) -> Result<BTreeMap<String, String>, ParseError> {
        let output = command.raw_output();
        let mut vars = BTreeMap::new();
        let mut last: Option<String> = None;

        for line in output.lines() {
            match line.split_once('=') {
                Some((key, value)) if is_name(key) => {
                    vars.insert(key.to_string(), value.to_string());
                    last = Some(key.to_string());
                }
                _ => {
                    let key = last
                        .as_ref()
                        .ok_or_else(|| ParseError::invalid_line(line, "expected KEY=VALUE"))?;
                    if let Some(value) = vars.get_mut(key) {
                        value.push('\n');
                        value.push_str(line);
                    }
                }
            }
        }

        Ok(vars)
    }
}

fn is_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
