//! Error types for the engine.
//!
//! This module distinguishes between:
//! - Errors raised by achievement actions ([`ActionError`]), tagged with an
//!   [`ErrorKind`] so error contexts can dispatch on them.
//! - Engine failures ([`UnravelError`]), every one of which means a human has
//!   to intervene: either the knowledge base is misconfigured or recovery ran
//!   out of options.

use thiserror::Error;

use crate::core::types::{Arity, ErrorKind};
use crate::io::exec::ExecError;

/// An error raised by an achievement action.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw diagnostic bytes matched against symptom patterns. Same as
    /// `message` unless the error came from output that is not valid UTF-8.
    pub text: Vec<u8>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ActionError {
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: kind.into(),
            text: message.clone().into_bytes(),
            message,
            source: None,
        }
    }

    /// Replace the bytes classification runs against.
    pub fn with_text(mut self, text: impl Into<Vec<u8>>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl From<ExecError> for ActionError {
    fn from(err: ExecError) -> Self {
        let text = err.diagnostic();
        ActionError::new(ErrorKind::EXEC, err.to_string())
            .with_text(text)
            .with_source(err)
    }
}

/// Lets an action propagate a nested `achieve` failure with `?`.
impl From<UnravelError> for ActionError {
    fn from(err: UnravelError) -> Self {
        ActionError::new(ErrorKind::HUMAN_INTERVENTION, err.to_string()).with_source(err)
    }
}

/// The top-level error type for registration and `achieve`.
#[derive(Debug, Error)]
pub enum UnravelError {
    #[error("{what} {name:?} already exists")]
    DuplicateRegistration { what: &'static str, name: String },

    #[error("No such achievement: {0:?}")]
    NoSuchAchievement(String),

    #[error("No error handlers for achievement: {0:?}")]
    NoErrorContext(String),

    #[error("No fix for: {0}")]
    MissingFix(String),

    #[error("Unregistered error: {symptom} to match {text:?}")]
    UnregisteredError { symptom: String, text: String },

    #[error("invalid pattern for symptom {symptom}")]
    InvalidPattern {
        symptom: String,
        #[source]
        source: regex::Error,
    },

    #[error("expected {expected} args for {achievement:?}, got: {got:?}")]
    ArityMismatch {
        achievement: String,
        expected: Arity,
        got: Vec<String>,
    },

    #[error("{0:?} unexpectedly returned false (expected true or error)")]
    UnexpectedResult(String),

    #[error("Achievement {achievement:?} is not declared to handle errors of kind: {kind}")]
    NoErrorHandler {
        achievement: String,
        kind: ErrorKind,
        #[source]
        source: ActionError,
    },

    /// The action raised a handled kind but no declared symptom matched.
    #[error("{achievement:?} failed: {source}")]
    Unclassified {
        achievement: String,
        #[source]
        source: ActionError,
    },

    #[error("Can't find root cause for: {symptom}")]
    NoKnownRootCause { symptom: String },

    #[error("{cause} wasn't ultimately fixed (it occurred again)")]
    SameCauseReoccurring { cause: String },

    #[error("{achievement:?} still failing after {attempts} attempts (last symptom: {symptom})")]
    RetriesExhausted {
        achievement: String,
        attempts: u32,
        symptom: String,
    },

    #[error("fix for {root_cause} failed")]
    FixFailed {
        root_cause: String,
        #[source]
        source: anyhow::Error,
    },
}

impl UnravelError {
    /// Returns true if the knowledge base or the call itself is misconfigured.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            UnravelError::DuplicateRegistration { .. }
                | UnravelError::NoSuchAchievement(_)
                | UnravelError::NoErrorContext(_)
                | UnravelError::MissingFix(_)
                | UnravelError::UnregisteredError { .. }
                | UnravelError::InvalidPattern { .. }
                | UnravelError::ArityMismatch { .. }
                | UnravelError::UnexpectedResult(_)
                | UnravelError::NoErrorHandler { .. }
        )
    }

    /// Returns true if the engine tried to recover and could not converge.
    pub fn is_recovery_exhaustion(&self) -> bool {
        matches!(
            self,
            UnravelError::NoKnownRootCause { .. }
                | UnravelError::SameCauseReoccurring { .. }
                | UnravelError::RetriesExhausted { .. }
        )
    }
}
