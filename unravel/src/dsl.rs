//! Registration surface used to populate a session's knowledge base.
//!
//! These are setup-time helpers. Register everything before the first
//! [`Session::achieve`] call.

use regex::bytes::Regex;

use crate::core::registry::{Action, Fix};
use crate::core::types::ErrorContext;
use crate::error::UnravelError;
use crate::session::Session;

impl Session {
    /// Declare an achievement together with its error context.
    pub fn achievement(
        &mut self,
        name: &str,
        contexts: ErrorContext,
        action: Action,
    ) -> Result<(), UnravelError> {
        let registry = self.registry_mut();
        registry.add_achievement(name, action)?;
        registry.add_error_context(name, contexts);
        Ok(())
    }

    /// Register the pattern that recognizes `symptom` in raw error text.
    pub fn symptom(&mut self, symptom: &str, pattern: &str) -> Result<(), UnravelError> {
        let regex = Regex::new(pattern).map_err(|source| UnravelError::InvalidPattern {
            symptom: symptom.to_string(),
            source,
        })?;
        self.registry_mut().add_pattern(symptom, regex);
        Ok(())
    }

    pub fn root_cause_for(&mut self, symptom: &str, root_cause: &str) {
        self.registry_mut().add_symptom(symptom, root_cause);
    }

    pub fn fix_for(&mut self, root_cause: &str, fix: Fix) -> Result<(), UnravelError> {
        self.registry_mut().add_fix(root_cause, fix)
    }

    /// Fix `root_cause` by achieving `target` with the groups captured from
    /// the triggering error as arguments.
    pub fn fix_for_achievement(&mut self, root_cause: &str, target: &str) -> Result<(), UnravelError> {
        self.fix_for(root_cause, Fix::achieve(target))
    }

    /// Shorthand for a failure whose fix is a single achievement.
    ///
    /// Wires the symptom `symptom` (recognized by `pattern`) to the root cause
    /// `no_<fix_name>`, fixes that cause by achieving `fix_name`, and declares
    /// `fix_name` with `action` and `handlers` as its error context. Parts that
    /// already exist are left as they are, so several symptoms can share one fix.
    pub fn quickfix(
        &mut self,
        symptom: &str,
        pattern: &str,
        fix_name: &str,
        handlers: ErrorContext,
        action: Action,
    ) -> Result<(), UnravelError> {
        let root_cause = format!("no_{fix_name}");
        self.symptom(symptom, pattern)?;
        self.root_cause_for(symptom, &root_cause);
        if !self.registry().has_fix_for(&root_cause) {
            self.fix_for_achievement(&root_cause, fix_name)?;
        }
        if !self.registry().has_achievement(fix_name) {
            self.achievement(fix_name, handlers, action)?;
        }
        Ok(())
    }
}
