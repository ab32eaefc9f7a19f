//! Parser registry keyed by operation name

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use fleetsh_exec::Command;
use fleetsh_parse::{
    EnvParser, HostnameParser, ParseError, Parser, ProcessInfo, PsParser, Uptime, UptimeParser,
    UserSession, WhoParser,
};
use serde::Serialize;

use crate::result::CommandResult;

/// Structured output of any registered operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Structured {
    Processes(Vec<ProcessInfo>),
    Uptime(Uptime),
    Users(Vec<UserSession>),
    Environment(BTreeMap<String, String>),
    Text(String),
}

type ParseFn = dyn Fn(&Command) -> Result<Structured, ParseError> + Send + Sync;

/// Maps operation names to parsers
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<ParseFn>>,
}

impl ParserRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `ps`, `uptime`, `who`, `env` and `hostname`
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("ps", PsParser::default(), Structured::Processes);
        registry.register("uptime", UptimeParser, Structured::Uptime);
        registry.register("who", WhoParser, Structured::Users);
        registry.register("env", EnvParser, Structured::Environment);
        registry.register("hostname", HostnameParser, Structured::Text);
        registry
    }

    /// Register `parser` under `name`, replacing any previous entry
    pub fn register<P, F>(&mut self, name: impl Into<String>, parser: P, wrap: F)
    where
        P: Parser + 'static,
        F: Fn(P::Output) -> Structured + Send + Sync + 'static,
    {
        let parse = move |command: &Command| parser.parse(command).map(&wrap);
        self.parsers.insert(name.into(), Arc::new(parse));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Registered operation names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Wrap `command` in a result parsed by the parser registered as `name`
    ///
    /// An unknown name yields a result without structured data.
    #[must_use]
    pub fn result(&self, name: &str, command: Command) -> CommandResult<Structured> {
        match self.parsers.get(name) {
            Some(parser) => CommandResult::parsed(command, parser.as_ref()),
            None => CommandResult::unparsed(command),
        }
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
