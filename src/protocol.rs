//! Text command protocol spoken between the operator console and the display.
//!
//! One command per line: `<verb>[?] [arg]...`, split with shell-style quoting so a
//! single argument may carry spaces (`NAME 0 "Team A"`). A verb ending in `?` is a
//! query, anything else a directive.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unbalanced {0} quote")]
    UnbalancedQuote(char),
    #[error("dangling escape at end of line")]
    DanglingEscape,
    #[error("command has no verb")]
    MissingVerb,
}

/// Whether a command reads state or mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Directive,
    Query,
}

impl Kind {
    pub fn prefix(self) -> &'static str {
        match self {
            Kind::Directive => "do_",
            Kind::Query => "get_",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased verb with any trailing `?` removed.
    pub verb: String,
    pub kind: Kind,
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let tokens = split(line)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }
        Self::from_tokens(tokens)
    }

    /// Builds a command from already split tokens; the first token is the verb.
    /// Used when a position-scoped command re-dispatches its remaining arguments.
    pub fn from_tokens<I>(tokens: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut tokens = tokens.into_iter();
        let raw = tokens.next().ok_or(ParseError::Empty)?;
        let (verb, kind) = classify(&raw);
        if verb.is_empty() {
            return Err(ParseError::MissingVerb);
        }
        Ok(Self {
            verb,
            kind,
            args: tokens.collect(),
        })
    }

    pub fn handler_name(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.verb)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.verb)?;
        if self.kind == Kind::Query {
            f.write_str("?")?;
        }
        for arg in &self.args {
            write!(f, " {}", token(arg))?;
        }
        Ok(())
    }
}

/// Lower-cases a verb token and strips the query marker.
pub fn classify(raw: &str) -> (String, Kind) {
    let lowered = raw.trim().to_lowercase();
    match lowered.strip_suffix('?') {
        Some(verb) => (verb.to_string(), Kind::Query),
        None => (lowered, Kind::Directive),
    }
}

/// Derives the registry key a verb token resolves to: `scores?` -> `get_scores`.
pub fn handler_name(raw: &str) -> String {
    let (verb, kind) = classify(raw);
    format!("{}{}", kind.prefix(), verb)
}

/// Splits a line into words, honouring single quotes, double quotes and backslash
/// escapes the way a POSIX shell does.
pub fn split(line: &str) -> Result<Vec<String>, ParseError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            None => match c {
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '"' | '\'' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars.next().ok_or(ParseError::DanglingEscape)?;
                    current.push(escaped);
                    in_word = true;
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            Some('\'') => match c {
                '\'' => quote = None,
                c => current.push(c),
            },
            Some(_) => match c {
                '"' => quote = None,
                '\\' => match chars.next() {
                    Some(e @ ('"' | '\\')) => current.push(e),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(ParseError::UnbalancedQuote('"')),
                },
                c => current.push(c),
            },
        }
    }

    if let Some(q) = quote {
        return Err(ParseError::UnbalancedQuote(q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Quotes a value only when splitting would otherwise break it apart.
pub fn token(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'));
    if needs_quotes {
        quoted(value)
    } else {
        value.to_string()
    }
}

pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A feedback line under construction: a response keyword followed by arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    parts: Vec<String>,
}

impl Feedback {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            parts: vec![keyword.into()],
        }
    }

    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.parts.push(token(&value.to_string()));
        self
    }

    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        self.parts
            .extend(values.into_iter().map(|v| token(&v.to_string())));
        self
    }

    /// Always quoted, so names round-trip even when they look like numbers.
    pub fn quoted<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        self.parts
            .extend(values.into_iter().map(|v| quoted(v.as_ref())));
        self
    }

    /// `key=value`, with the value quoted in place when needed.
    pub fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.parts.push(format!("{key}={}", token(&value.to_string())));
        self
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(" "))
    }
}

impl From<Feedback> for String {
    fn from(feedback: Feedback) -> Self {
        feedback.to_string()
    }
}
