//! Error types for fleetsh-parse

use thiserror::Error;

/// Errors raised when output does not match the expected format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Command produced no output at all
    #[error("no output to parse")]
    Empty,

    /// A line could not be split into the expected fields
    #[error("invalid line {line:?}: {reason}")]
    InvalidLine {
        /// Offending line
        line: String,
        /// What was wrong with it
        reason: String,
    },

    /// A numeric field did not parse
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber {
        /// Field name
        field: &'static str,
        /// Raw value
        value: String,
    },
}

impl ParseError {
    pub(crate) fn invalid_line(line: &str, reason: impl Into<String>) -> Self {
        ParseError::InvalidLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a numeric field, naming it in the error
pub(crate) fn number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
