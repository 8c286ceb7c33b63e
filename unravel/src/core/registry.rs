//! In-memory knowledge base: achievements, error contexts, symptom patterns,
//! symptom → root cause edges and root cause → fix edges.
//!
//! Storage only. Validation happens on write; lookups that may legitimately
//! miss return `Option`, the rest fail with an [`UnravelError`].

use std::collections::HashMap;
use std::fmt;

use regex::bytes::Regex;

use crate::core::consistency::ConsistencyReport;
use crate::core::types::{Arity, ErrorContext, FixableError};
use crate::error::{ActionError, UnravelError};
use crate::session::Session;

type ActionFn = dyn Fn(&Session, &[String]) -> Result<bool, ActionError>;
type FixFn = dyn Fn(&Session, &FixableError) -> anyhow::Result<()>;

/// Executable body of an achievement.
///
/// An action reports success by returning `Ok(true)` and failure by returning
/// an [`ActionError`]. The session passed in lets an action achieve other
/// goals first.
pub struct Action {
    arity: Arity,
    run: Box<ActionFn>,
}

impl Action {
    /// An action taking no arguments.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Session) -> Result<bool, ActionError> + 'static,
    {
        Self {
            arity: Arity::Exact(0),
            run: Box::new(move |session, _args| f(session)),
        }
    }

    /// An action taking exactly `arity` arguments.
    pub fn with_args<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&Session, &[String]) -> Result<bool, ActionError> + 'static,
    {
        Self {
            arity: Arity::Exact(arity),
            run: Box::new(f),
        }
    }

    pub fn variadic<F>(f: F) -> Self
    where
        F: Fn(&Session, &[String]) -> Result<bool, ActionError> + 'static,
    {
        Self {
            arity: Arity::Variadic,
            run: Box::new(f),
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub(crate) fn call(&self, session: &Session, args: &[String]) -> Result<bool, ActionError> {
        (self.run)(session, args)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Remediation registered for a root cause.
pub enum Fix {
    /// Arbitrary remediation code.
    Run(Box<FixFn>),
    /// Achieve another achievement, passing the captured groups of the
    /// triggering error as its arguments.
    Achieve(String),
}

impl Fix {
    pub fn run<F>(f: F) -> Self
    where
        F: Fn(&Session, &FixableError) -> anyhow::Result<()> + 'static,
    {
        Fix::Run(Box::new(f))
    }

    pub fn achieve(target: impl Into<String>) -> Self {
        Fix::Achieve(target.into())
    }
}

impl fmt::Debug for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fix::Run(_) => f.write_str("Fix::Run(..)"),
            Fix::Achieve(target) => f.debug_tuple("Fix::Achieve").field(target).finish(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    achievements: HashMap<String, Action>,
    contexts: HashMap<String, ErrorContext>,
    patterns: HashMap<String, Regex>,
    symptoms: HashMap<String, String>,
    fixes: HashMap<String, Fix>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_achievement(&mut self, name: &str, action: Action) -> Result<(), UnravelError> {
        if self.achievements.contains_key(name) {
            return Err(UnravelError::DuplicateRegistration {
                what: "achievement",
                name: name.to_string(),
            });
        }
        self.achievements.insert(name.to_string(), action);
        Ok(())
    }

    pub fn has_achievement(&self, name: &str) -> bool {
        self.achievements.contains_key(name)
    }

    pub fn get_achievement(&self, name: &str) -> Result<&Action, UnravelError> {
        self.achievements
            .get(name)
            .ok_or_else(|| UnravelError::NoSuchAchievement(name.to_string()))
    }

    /// Register the error context of an achievement. The first registration
    /// for a name wins; later ones are ignored.
    pub fn add_error_context(&mut self, name: &str, context: ErrorContext) {
        self.contexts.entry(name.to_string()).or_insert(context);
    }

    pub fn get_error_context(&self, name: &str) -> Result<&ErrorContext, UnravelError> {
        self.contexts
            .get(name)
            .ok_or_else(|| UnravelError::NoErrorContext(name.to_string()))
    }

    /// Map a symptom to its root cause, replacing any earlier mapping.
    pub fn add_symptom(&mut self, symptom: &str, root_cause: &str) {
        self.symptoms
            .insert(symptom.to_string(), root_cause.to_string());
    }

    /// `None` means the symptom is known by pattern but not attributed to a cause.
    pub fn get_root_cause(&self, symptom: &str) -> Option<&str> {
        self.symptoms.get(symptom).map(String::as_str)
    }

    pub fn add_pattern(&mut self, symptom: &str, pattern: Regex) {
        self.patterns.insert(symptom.to_string(), pattern);
    }

    pub fn get_pattern(&self, symptom: &str) -> Option<&Regex> {
        self.patterns.get(symptom)
    }

    pub fn add_fix(&mut self, root_cause: &str, fix: Fix) -> Result<(), UnravelError> {
        if self.fixes.contains_key(root_cause) {
            return Err(UnravelError::DuplicateRegistration {
                what: "fix for root cause",
                name: root_cause.to_string(),
            });
        }
        self.fixes.insert(root_cause.to_string(), fix);
        Ok(())
    }

    pub fn has_fix_for(&self, root_cause: &str) -> bool {
        self.fixes.contains_key(root_cause)
    }

    pub fn get_fix(&self, root_cause: &str) -> Result<&Fix, UnravelError> {
        self.fixes
            .get(root_cause)
            .ok_or_else(|| UnravelError::MissingFix(root_cause.to_string()))
    }

    pub(crate) fn fix_names(&self) -> impl Iterator<Item = &str> {
        self.fixes.keys().map(String::as_str)
    }

    pub(crate) fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub(crate) fn symptom_edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symptoms
            .iter()
            .map(|(symptom, cause)| (symptom.as_str(), cause.as_str()))
    }

    pub(crate) fn error_contexts(&self) -> impl Iterator<Item = &ErrorContext> {
        self.contexts.values()
    }

    pub fn consistency_report(&self) -> ConsistencyReport {
        ConsistencyReport::from_registry(self)
    }
}
