//! Shared types for the knowledge base and the retry state machine.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use regex::bytes::Captures;
use thiserror::Error;

/// Tag carried by every error an achievement action raises.
///
/// Error contexts are keyed by kind, so dispatch is an exact map lookup rather
/// than a type hierarchy walk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorKind(Cow<'static, str>);

impl ErrorKind {
    /// Raised by the [`Exec`](crate::io::exec::Exec) collaborator.
    pub const EXEC: ErrorKind = ErrorKind::from_static("ExecError");
    /// A nested `achieve` call inside an action gave up.
    pub const HUMAN_INTERVENTION: ErrorKind = ErrorKind::from_static("HumanInterventionNeeded");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ErrorKind {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// Number of arguments an achievement action accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Any number of arguments, including none.
    Variadic,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(expected) => expected == count,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::Variadic => f.write_str("any number of"),
        }
    }
}

/// Per-achievement mapping from error kind to the symptom names to try, in
/// declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    handlers: BTreeMap<ErrorKind, Vec<String>>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the symptoms to try when the action raises `kind`.
    ///
    /// Declaring the same kind twice replaces the earlier list.
    pub fn on<I, S>(mut self, kind: impl Into<ErrorKind>, symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handlers
            .insert(kind.into(), symptoms.into_iter().map(Into::into).collect());
        self
    }

    pub fn symptoms_for(&self, kind: &ErrorKind) -> Option<&[String]> {
        self.handlers.get(kind).map(Vec::as_slice)
    }

    /// Every symptom name referenced by any kind.
    pub fn symptoms(&self) -> impl Iterator<Item = &str> {
        self.handlers.values().flatten().map(String::as_str)
    }
}

/// A failure classified to a known symptom.
///
/// Only produced by the classifier and always consumed by the session; it never
/// reaches callers of `achieve`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("symptom {symptom} matched")]
pub struct FixableError {
    pub symptom: String,
    /// Capturing groups of the symptom pattern, in order. Groups that did not
    /// participate in the match are empty.
    pub groups: Vec<String>,
}

impl FixableError {
    pub fn from_captures(symptom: &str, captures: &Captures<'_>) -> Self {
        let groups = captures
            .iter()
            .skip(1)
            .map(|group| {
                group
                    .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                    .unwrap_or_default()
            })
            .collect();
        Self {
            symptom: symptom.to_string(),
            groups,
        }
    }
}
