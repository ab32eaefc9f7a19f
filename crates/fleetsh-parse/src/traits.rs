//! Parser trait

use fleetsh_exec::Command;

use crate::error::ParseError;

/// Turns a completed command's output into a typed value
///
/// Implementations must be deterministic and must not run commands.
/// Invocation parameters (a user filter, say) live in the parser value.
pub trait Parser: Send + Sync {
    type Output;

    /// Parse the captured output of `command`
    ///
    /// # Errors
    /// Returns `ParseError` when the output does not have the expected shape
    fn parse(&self, command: &Command) -> Result<Self::Output, ParseError>;
}

impl<F, T> Parser for F
where
    F: Fn(&Command) -> Result<T, ParseError> + Send + Sync + ?Sized,
{
    type Output = T;

    fn parse(&self, command: &Command) -> Result<T, ParseError> {
        self(command)
    }
}
