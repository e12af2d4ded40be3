//! Verb -> handler tables for dispatch targets.
//!
//! Every dispatch target (the engine, each screen variant) owns one `Registry`
//! built once at first use. Keys are derived handler names (`do_score`,
//! `get_teams`), so adding a command means adding an entry, not editing a switch.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::protocol::{Kind, ParseError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid {name} '{value}': {reason}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown screen '{0}'")]
    UnknownScreen(String),
    #[error("no renderer named '{0}'")]
    UnknownStyle(String),
    #[error("unknown position '{0}'")]
    UnknownPosition(String),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Outcome = Result<Option<String>, CommandError>;

pub type DirectiveFn<T> = fn(&mut T, &[String]) -> Outcome;
pub type QueryFn<T> = fn(&T, &[String]) -> Result<String, CommandError>;

enum Call<T> {
    Directive(DirectiveFn<T>),
    Query(QueryFn<T>),
}

struct Handler<T> {
    params: &'static [&'static str],
    call: Call<T>,
}

pub struct Registry<T> {
    handlers: BTreeMap<String, Handler<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directive(
        mut self,
        verb: &str,
        params: &'static [&'static str],
        call: DirectiveFn<T>,
    ) -> Self {
        self.insert(Kind::Directive, verb, params, Call::Directive(call));
        self
    }

    pub fn query(mut self, verb: &str, params: &'static [&'static str], call: QueryFn<T>) -> Self {
        self.insert(Kind::Query, verb, params, Call::Query(call));
        self
    }

    fn insert(&mut self, kind: Kind, verb: &str, params: &'static [&'static str], call: Call<T>) {
        let key = format!("{}{}", kind.prefix(), verb);
        self.handlers.insert(key, Handler { params, call });
    }

    pub fn contains(&self, handler: &str) -> bool {
        self.handlers.contains_key(handler)
    }

    pub fn params(&self, handler: &str) -> Option<&'static [&'static str]> {
        self.handlers.get(handler).map(|h| h.params)
    }

    /// Runs the handler registered under `handler`, or returns `None` when this
    /// registry has no such entry. Queries always produce feedback.
    pub fn invoke(&self, target: &mut T, handler: &str, args: &[String]) -> Option<Outcome> {
        let entry = self.handlers.get(handler)?;
        Some(match entry.call {
            Call::Directive(call) => call(target, args),
            Call::Query(call) => call(target, args).map(Some),
        })
    }

    /// Command names as the operator types them: `score`, `teams?`.
    pub fn commands(&self) -> impl Iterator<Item = String> + '_ {
        self.handlers.keys().filter_map(|key| {
            if let Some(verb) = key.strip_prefix(Kind::Directive.prefix()) {
                Some(verb.to_string())
            } else {
                key.strip_prefix(Kind::Query.prefix()).map(|verb| format!("{verb}?"))
            }
        })
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

pub fn arg<'a>(args: &'a [String], index: usize, name: &'static str) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(CommandError::MissingArgument(name))
}

pub fn parse_arg<V>(args: &[String], index: usize, name: &'static str) -> Result<V, CommandError>
where
    V: FromStr,
    V::Err: fmt::Display,
{
    let value = arg(args, index, name)?;
    parse_value(value, name)
}

pub fn optional_arg<V>(
    args: &[String],
    index: usize,
    name: &'static str,
) -> Result<Option<V>, CommandError>
where
    V: FromStr,
    V::Err: fmt::Display,
{
    args.get(index).map(|value| parse_value(value, name)).transpose()
}

fn parse_value<V>(value: &str, name: &'static str) -> Result<V, CommandError>
where
    V: FromStr,
    V::Err: fmt::Display,
{
    value
        .trim()
        .parse::<V>()
        .map_err(|err| CommandError::InvalidArgument {
            name,
            value: value.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        value: i64,
        calls: usize,
    }

    fn do_add(counter: &mut Counter, args: &[String]) -> Outcome {
        let delta: i64 = parse_arg(args, 0, "delta")?;
        counter.value += delta;
        counter.calls += 1;
        Ok(None)
    }

    fn get_value(counter: &Counter, _: &[String]) -> Result<String, CommandError> {
        Ok(format!("VALUE {}", counter.value))
    }

    fn registry() -> Registry<Counter> {
        Registry::new()
            .directive("add", &["delta"], do_add)
            .query("value", &[], get_value)
    }

    #[test]
    fn keys_use_derived_handler_names() {
        let registry = registry();
        assert!(registry.contains("do_add"));
        assert!(registry.contains("get_value"));
        assert!(!registry.contains("do_value"));
        assert_eq!(registry.params("do_add"), Some(&["delta"][..]));
        let commands: Vec<String> = registry.commands().collect();
        assert_eq!(commands, vec!["add".to_string(), "value?".to_string()]);
    }

    #[test]
    fn invoke_runs_exactly_the_named_handler() {
        let registry = registry();
        let mut counter = Counter::default();
        let outcome = registry.invoke(&mut counter, "do_add", &["5".to_string()]);
        assert!(matches!(outcome, Some(Ok(None))));
        assert_eq!(counter.calls, 1);
        let outcome = registry.invoke(&mut counter, "get_value", &[]);
        assert_eq!(outcome.unwrap().unwrap(), Some("VALUE 5".to_string()));
        assert!(registry.invoke(&mut counter, "do_missing", &[]).is_none());
    }

    #[test]
    fn bad_arguments_leave_target_untouched() {
        let registry = registry();
        let mut counter = Counter::default();
        let outcome = registry.invoke(&mut counter, "do_add", &["lots".to_string()]);
        assert!(matches!(
            outcome,
            Some(Err(CommandError::InvalidArgument { name: "delta", .. }))
        ));
        let outcome = registry.invoke(&mut counter, "do_add", &[]);
        assert!(matches!(outcome, Some(Err(CommandError::MissingArgument("delta")))));
        assert_eq!(counter.value, 0);
        assert_eq!(counter.calls, 0);
    }

    #[test]
    fn optional_args_parse_when_present() {
        let args = vec!["7".to_string()];
        assert_eq!(optional_arg::<u32>(&args, 0, "n").unwrap(), Some(7));
        assert_eq!(optional_arg::<u32>(&args, 1, "n").unwrap(), None);
        assert!(optional_arg::<u32>(&args, 0, "n").is_ok());
    }
}
